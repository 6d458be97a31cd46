use tplc::lexer::{Lexer, TokenStream};
use tplc::parser::Parser;

fn compile(source: &str) -> String {
    tplc::compile(source, false).unwrap()
}

fn compile_err(source: &str) -> String {
    tplc::compile(source, false).unwrap_err().to_string()
}

fn parse_checked(source: &str) -> Parser {
    let tokens = Lexer::tokenize(source).unwrap();
    let mut parser = Parser::new(TokenStream::new(tokens));
    parser.parse_program().unwrap();
    parser
}

#[test]
fn assignment_of_constant_sum() {
    let ir = compile("program P; a : int; begin a := 1 + 2; end;");
    let expected = "\
_P:
    MOVE R1, 1
    ADD R1, 2
    MOVE a, R1
    HALT
; Data directives for program variables.
a: DATA 1
";
    assert_eq!(ir, expected);
}

#[test]
fn empty_statement_list() {
    let ir = compile("program P; begin ; end;");
    assert_eq!(ir, "_P:\n    HALT\n");
}

#[test]
fn print_reads_memory_operand() {
    let ir = compile("program P; q : int; begin print q; end;");
    let expected = "\
_P:
    MOVE R1, q
    OUTB R1
    HALT
; Data directives for program variables.
q: DATA 1
";
    assert_eq!(ir, expected);
}

#[test]
fn while_loop_with_comparison() {
    let ir = compile(
        "program P; i : int; begin i := 0; while i < 10 loop begin i := i + 1; end; end;",
    );
    let expected = "\
_P:
    MOVE R1, 0
    MOVE i, R1
while_cond1:
    MOVE R1, i
; Compare two values by examining their difference.
    SUB R1, 10
; Normalize result of comparison to 0 or 1.
    BREZ R1, compare_false1
    BRPO R1, compare_false1
    MOVE R1, 1
    BR compare_done1
compare_false1:
    MOVE R1, 0
compare_done1:
    BREZ R1, while_done1
    MOVE R1, i
    ADD R1, 1
    MOVE i, R1
    BR while_cond1
while_done1:
    HALT
; Data directives for program variables.
i: DATA 1
";
    assert_eq!(ir, expected);
}

#[test]
fn if_else_branches_and_labels() {
    let ir = compile(
        "program P; a : int; begin if a >= 1 then begin a := 2; end else begin a := 3; end; end;",
    );
    let expected = "\
_P:
    MOVE R1, a
; Compare two values by examining their difference.
    SUB R1, 1
; Normalize result of comparison to 0 or 1.
    BRNE R1, compare_false1
    MOVE R1, 1
    BR compare_done1
compare_false1:
    MOVE R1, 0
compare_done1:
    BREZ R1, else1
    MOVE R1, 2
    MOVE a, R1
    BR if_done1
else1:
    MOVE R1, 3
    MOVE a, R1
if_done1:
    HALT
; Data directives for program variables.
a: DATA 1
";
    assert_eq!(ir, expected);
}

#[test]
fn not_and_or_normalization() {
    let ir = compile("program P; f : bool; g : bool; begin f := not g or f; end;");
    let expected = "\
_P:
    MOVE R1, g
    NOT R1
    ADD R1, f
; Normalize result of OR operation to 0 or 1.
    BREZ R1, or_done1
    MOVE R1, 1
or_done1:
    MOVE f, R1
    HALT
; Data directives for program variables.
f: DATA 1
g: DATA 1
";
    assert_eq!(ir, expected);
}

#[test]
fn unary_minus_on_literal() {
    let ir = compile("program P; a : int; begin a := -5; end;");
    let expected = "\
_P:
    MOVE R1, 5
    NEG R1
    MOVE a, R1
    HALT
; Data directives for program variables.
a: DATA 1
";
    assert_eq!(ir, expected);
}

#[test]
fn four_live_values_spill_the_outermost_candidate() {
    let ir = compile(
        "program P; a,b,c : int; begin a := (b+c) * ((b+c) * ((b+c) * (b+c))); end;",
    );
    let expected = "\
_P:
    MOVE R1, b
    ADD R1, c
    MOVE R2, b
    ADD R2, c
    MOVE R3, b
    ADD R3, c
; Spill register to memory since all registers are live.
    MOVE spill1, R3
    MOVE R3, b
    ADD R3, c
; Spill register to memory since all registers are live.
    MOVE spill2, R3
    MOVE R3, spill1
    MUL R3, spill2
    MUL R2, R3
    MUL R1, R2
    MOVE a, R1
    HALT
; Data directives for program variables.
a: DATA 1
b: DATA 1
c: DATA 1
; Data directives for spilled memories.
spill1: DATA 1
spill2: DATA 1
";
    assert_eq!(ir, expected);
}

#[test]
fn three_registers_cover_balanced_products_without_spilling() {
    let parser = parse_checked(
        "program P; a,b,c,d : int; begin a := ((b + c) * (b - c)) + ((b + c) * (b - c)); end;",
    );
    assert!(!parser.ir().contains("spill"));
    assert!(parser.registers().all_free());
}

#[test]
fn spill_slots_are_reused_across_statements() {
    let deep = "(b+c) * ((b+c) * ((b+c) * (b+c)))";
    let source =
        format!("program P; a,b,c : int; begin a := {deep}; a := {deep}; end;");
    let ir = compile(&source);

    assert_eq!(ir.matches("spill1: DATA 1").count(), 1);
    assert_eq!(ir.matches("spill2: DATA 1").count(), 1);
    assert!(!ir.contains("spill3"));
}

#[test]
fn registers_and_spill_slots_balance_after_compilation() {
    let parser = parse_checked(
        "program P; a,b,c : int; f : bool; \
         begin \
             a := (b+c) * ((b+c) * ((b+c) * (b+c))); \
             while a > 0 loop begin a := a - 1; end; \
             if a = 0 then begin print b; end; \
             f := (b < c) or (b > c); \
         end;",
    );
    assert!(parser.registers().all_free());
    assert!(parser.spills().all_inactive());
}

#[test]
fn codegen_is_deterministic() {
    let source = "program P; a,b : int; begin a := b * (b + 1); while a > b loop begin a := a - 1; end; end;";
    let first = tplc::compile(source, false).unwrap();
    let second = tplc::compile(source, false).unwrap();
    assert_eq!(first, second);

    let p1 = parse_checked(source);
    let p2 = parse_checked(source);
    assert_eq!(p1.symbols().dump(), p2.symbols().dump());
}

#[test]
fn generated_labels_are_unique() {
    let ir = compile(
        "program P; a : int; \
         begin \
             if a = 1 then begin a := 2; end else begin a := 3; end; \
             if a = 2 then begin a := 4; end; \
             while a > 0 loop begin a := a - 1; end; \
             while a < 9 loop begin a := a + 1; end; \
         end;",
    );
    let labels: Vec<&str> = ir
        .lines()
        .filter(|line| line.ends_with(':'))
        .collect();
    let mut deduped = labels.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(labels.len(), deduped.len());
}

#[test]
fn assigning_int_to_bool_is_a_type_error() {
    let err = compile_err("program P; a : bool; begin a := 1; end;");
    assert_eq!(err, "Type error: expected BOOL found INT.");
}

#[test]
fn redeclaration_is_reported() {
    let err = compile_err("program P; a : int; a : bool; begin end;");
    assert_eq!(err, "The identifier a has already been declared.");
}

#[test]
fn undeclared_assignment_target_is_reported() {
    let err = compile_err("program P; begin a := 1; end;");
    assert_eq!(err, "The identifier a has not been declared.");
}

#[test]
fn if_condition_must_be_bool() {
    let err = compile_err("program P; a : int; begin if a then begin print a; end; end;");
    assert_eq!(err, "Type error: expected BOOL found INT.");
}

#[test]
fn print_rejects_procedure_values() {
    let err = compile_err(
        "program P; procedure Q(); begin ; end; begin print Q; end;",
    );
    assert_eq!(err, "Type error: expected INT or BOOL, found PROCEDURE.");
}

#[test]
fn mixed_operand_types_in_addition() {
    let err = compile_err("program P; a : int; f : bool; begin a := a + f; end;");
    assert_eq!(err, "Type error: expected INT found BOOL.");
}

#[test]
fn procedure_call_type_checks_actuals_without_emitting_calls() {
    let ir = compile(
        "program P; x : int; procedure Q(y : int); begin y := 1; end; begin Q(5); end;",
    );
    let expected = "\
_P:
    MOVE R1, 1
    MOVE y, R1
    HALT
; Data directives for program variables.
x: DATA 1
";
    assert_eq!(ir, expected);
    assert!(!ir.contains("BR "));
}

#[test]
fn actual_parameter_type_mismatch() {
    let err = compile_err(
        "program P; procedure Q(y : int); begin ; end; begin Q(1 = 2); end;",
    );
    assert_eq!(err, "Type error: expected INT found BOOL.");
}

#[test]
fn actual_parameters_check_by_ordinal() {
    let parser = parse_checked(
        "program P; b : int; \
         procedure R(m, n : int; flag : bool); begin m := n; end; \
         begin R(1, b + 1, b = 2); end;",
    );
    assert!(parser.registers().all_free());
}

#[test]
fn surplus_actual_parameter_is_a_type_error() {
    let err = compile_err(
        "program P; procedure Q(); begin ; end; begin Q(1); end;",
    );
    assert_eq!(err, "Type error: expected GARBAGE found INT.");
}

#[test]
fn calling_a_variable_is_a_type_error() {
    let err = compile_err("program P; x : int; begin x(1); end;");
    assert_eq!(err, "Type error: expected PROCEDURE found INT.");
}

#[test]
fn globals_are_visible_inside_procedures() {
    let ir = compile(
        "program P; g : int; procedure Q(); begin g := 5; end; begin Q(); end;",
    );
    let expected = "\
_P:
    MOVE R1, 5
    MOVE g, R1
    HALT
; Data directives for program variables.
g: DATA 1
";
    assert_eq!(ir, expected);
}

#[test]
fn formal_shadowing_a_global_is_a_redeclaration() {
    let err = compile_err(
        "program P; g : int; procedure Q(g : int); begin ; end; begin Q(1); end;",
    );
    assert_eq!(err, "The identifier g has already been declared.");
}

#[test]
fn missing_semicolon_is_a_parse_error() {
    let err = compile_err("program P; a : int begin end;");
    assert_eq!(err, "Parse error: Expected: ';', Found: TOKEN_KEYWORD:begin");
}

#[test]
fn missing_program_keyword_is_a_parse_error() {
    let err = compile_err("begin end;");
    assert_eq!(
        err,
        "Parse error: Expected: keyword program, Found: TOKEN_KEYWORD:begin"
    );
}

#[test]
fn empty_block_is_a_parse_error() {
    let err = compile_err("program P; begin end;");
    assert_eq!(
        err,
        "Parse error: Expected: statement or ';', Found: TOKEN_KEYWORD:end"
    );
}

#[test]
fn trailing_input_is_a_parse_error() {
    let err = compile_err("program P; begin ; end; extra");
    assert_eq!(err, "Parse error: Expected: EOF, Found: TOKEN_ID:extra");
}

#[test]
fn lenient_parser_reports_and_continues() {
    let tokens = Lexer::tokenize("program P; begin a := 1; end;").unwrap();
    let mut parser = Parser::lenient(TokenStream::new(tokens));

    // The undeclared target and the resulting assignment mismatch are both
    // reported, and the parse still runs to completion.
    assert!(parser.parse_program().is_ok());
    assert_eq!(parser.error_count(), 2);
    assert!(parser.done_with_input());
    assert!(parser.registers().all_free());
}

#[test]
fn lenient_parser_skips_redeclaration_but_finishes() {
    let tokens = Lexer::tokenize("program P; a : int; a : bool; begin ; end;").unwrap();
    let mut parser = Parser::lenient(TokenStream::new(tokens));

    assert!(parser.parse_program().is_ok());
    assert_eq!(parser.error_count(), 1);
}

#[test]
fn lenient_parser_still_stops_on_syntax_errors() {
    let tokens = Lexer::tokenize("program P; a : int; begin a := ; end;").unwrap();
    let mut parser = Parser::lenient(TokenStream::new(tokens));

    assert!(parser.parse_program().is_err());
}
