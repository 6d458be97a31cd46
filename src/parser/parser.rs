use std::rc::Rc;

use crate::analyzer::{ExprType, SymbolTable};
use crate::codegen::{
    BinaryInst, BranchCond, Emitter, Operand, OperandSlot, Register, RegisterAllocator,
    SpillTable, UnaryInst,
};
use crate::error::{CompileError, CompileResult};
use crate::lexer::{AddOp, Keyword, MulOp, Punct, RelOp, Token, TokenStream};

const EXTERNAL_ENV: &str = "_EXTERNAL";

/// Single-pass LL(1) recursive-descent parser. One method per non-terminal;
/// each method matches its production against one token of lookahead,
/// performs the semantic checks for the construct, and emits its IR on the
/// way through. Expression methods additionally synthesize the type and the
/// operand of the sub-expression they recognized.
pub struct Parser {
    stream: TokenStream,
    lookahead: Token,

    stab: SymbolTable,
    current_env: String,
    main_env: String,
    /// Most recently seen assignee or callee, consulted by call type checks.
    callee_name: String,
    actual_parm_position: usize,
    formal_parm_position: usize,
    parsing_formal_parm_list: bool,

    emitter: Emitter,
    registers: RegisterAllocator,
    spills: SpillTable,
    /// The slot holding the most recently created register operand. When all
    /// registers are live, this is the one value the current emission path
    /// can still reach, so it is the spill victim.
    last_register_op: Option<OperandSlot>,
    program_labels: Vec<String>,

    lenient: bool,
    error_count: usize,
    trace_enabled: bool,
}

impl Parser {
    pub fn new(stream: TokenStream) -> Self {
        Self::with_mode(stream, false)
    }

    /// A lenient parser reports semantic errors to stderr and keeps going,
    /// so malformed inputs can be exercised without aborting the host.
    /// Syntax errors still end the parse.
    pub fn lenient(stream: TokenStream) -> Self {
        Self::with_mode(stream, true)
    }

    fn with_mode(mut stream: TokenStream, lenient: bool) -> Self {
        let lookahead = stream.next_token();
        Self {
            stream,
            lookahead,
            stab: SymbolTable::new(),
            current_env: String::new(),
            main_env: String::new(),
            callee_name: String::new(),
            actual_parm_position: 0,
            formal_parm_position: 0,
            parsing_formal_parm_list: false,
            emitter: Emitter::new(),
            registers: RegisterAllocator::new(),
            spills: SpillTable::new(),
            last_register_op: None,
            program_labels: vec![],
            lenient,
            error_count: 0,
            trace_enabled: false,
        }
    }

    pub fn with_trace(mut self, enabled: bool) -> Self {
        self.trace_enabled = enabled;
        self
    }

    pub fn done_with_input(&self) -> bool {
        self.lookahead == Token::Eof
    }

    pub fn trailing_input_error(&self) -> CompileError {
        CompileError::Syntax {
            expected: "EOF".to_string(),
            found: self.lookahead.to_string(),
        }
    }

    pub fn into_ir(self) -> String {
        self.emitter.into_output()
    }

    pub fn ir(&self) -> &str {
        self.emitter.output()
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.stab
    }

    pub fn registers(&self) -> &RegisterAllocator {
        &self.registers
    }

    pub fn spills(&self) -> &SpillTable {
        &self.spills
    }

    /// Number of semantic errors reported so far in lenient mode.
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    // ----- Lookahead handling -----

    fn advance(&mut self) {
        self.lookahead = self.stream.next_token();
        if self.trace_enabled {
            eprintln!("Parsing: {}", self.lookahead);
        }
    }

    fn at_keyword(&self, kw: Keyword) -> bool {
        matches!(self.lookahead, Token::Keyword(k) if k == kw)
    }

    fn at_punct(&self, punct: Punct) -> bool {
        matches!(self.lookahead, Token::Punct(p) if p == punct)
    }

    fn at_addop(&self, op: AddOp) -> bool {
        matches!(self.lookahead, Token::AddOp(a) if a == op)
    }

    fn at_ident(&self) -> bool {
        matches!(self.lookahead, Token::Ident(_))
    }

    fn ident_attr(&self) -> Option<String> {
        match &self.lookahead {
            Token::Ident(name) => Some(name.clone()),
            _ => None,
        }
    }

    fn addop_attr(&self) -> Option<AddOp> {
        match self.lookahead {
            Token::AddOp(op) => Some(op),
            _ => None,
        }
    }

    fn mulop_attr(&self) -> Option<MulOp> {
        match self.lookahead {
            Token::MulOp(op) => Some(op),
            _ => None,
        }
    }

    fn relop_attr(&self) -> Option<RelOp> {
        match self.lookahead {
            Token::RelOp(op) => Some(op),
            _ => None,
        }
    }

    fn at_stmt_start(&self) -> bool {
        self.at_ident()
            || self.at_keyword(Keyword::If)
            || self.at_keyword(Keyword::While)
            || self.at_keyword(Keyword::Print)
    }

    fn at_expr_start(&self) -> bool {
        self.at_ident()
            || matches!(self.lookahead, Token::Num(_))
            || self.at_punct(Punct::Open)
            || self.at_addop(AddOp::Add)
            || self.at_addop(AddOp::Sub)
            || self.at_keyword(Keyword::Not)
    }

    fn expect_keyword(&mut self, kw: Keyword, expected: &str) -> CompileResult<()> {
        if self.at_keyword(kw) {
            self.advance();
            Ok(())
        } else {
            Err(self.syntax_error(expected))
        }
    }

    fn expect_punct(&mut self, punct: Punct, expected: &str) -> CompileResult<()> {
        if self.at_punct(punct) {
            self.advance();
            Ok(())
        } else {
            Err(self.syntax_error(expected))
        }
    }

    // ----- Diagnostics -----

    fn trace(&self, production: &str) {
        if self.trace_enabled {
            eprintln!("{production}");
        }
    }

    fn syntax_error(&mut self, expected: &str) -> CompileError {
        let err = CompileError::Syntax {
            expected: expected.to_string(),
            found: self.lookahead.to_string(),
        };
        if self.lenient {
            eprintln!("{err}");
            self.error_count += 1;
        }
        err
    }

    fn semantic_error(&mut self, err: CompileError) -> CompileResult<()> {
        if self.lenient {
            eprintln!("{err}");
            self.error_count += 1;
            Ok(())
        } else {
            Err(err)
        }
    }

    fn multiply_defined(&mut self, name: &str) -> CompileResult<()> {
        self.semantic_error(CompileError::MultiplyDefined(name.to_string()))
    }

    fn undeclared(&mut self, name: &str) -> CompileResult<()> {
        self.semantic_error(CompileError::Undeclared(name.to_string()))
    }

    fn type_mismatch(&mut self, expected: ExprType, found: ExprType) -> CompileResult<()> {
        self.semantic_error(CompileError::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        })
    }

    fn type_mismatch_either(
        &mut self,
        expected: ExprType,
        alternative: ExprType,
        found: ExprType,
    ) -> CompileResult<()> {
        self.semantic_error(CompileError::TypeMismatchEither {
            expected: expected.to_string(),
            alternative: alternative.to_string(),
            found: found.to_string(),
        })
    }

    // ----- Register pressure -----

    /// Evict the most recent register operand to spill memory, rewriting its
    /// slot so the production that still holds it sees the memory form.
    fn spill_last_register(&mut self) {
        let slot = match &self.last_register_op {
            Some(slot) => Rc::clone(slot),
            None => panic!("register pressure with no spill candidate"),
        };
        let register = match *slot.borrow() {
            Operand::Register(register) => register,
            _ => panic!("spill candidate is not register resident"),
        };
        let label = self.spills.acquire(&mut self.emitter);
        self.emitter
            .emit_comment("Spill register to memory since all registers are live.");
        self.emitter.emit_move_to_mem(&label, register);
        self.registers.deallocate_register(register);
        *slot.borrow_mut() = Operand::Memory(label);
    }

    /// Ensure the operand's value is in a register, allocating (and spilling
    /// first if nothing is free) when it is not already there. The slot is
    /// rewritten to its register form; a spill cell it occupied is released.
    fn materialize(&mut self, op: &OperandSlot) -> Register {
        if let Operand::Register(register) = *op.borrow() {
            return register;
        }
        if !self.registers.has_free_register() {
            self.spill_last_register();
        }
        let register = self.registers.allocate_register();
        {
            let current = op.borrow();
            self.emitter.emit_move_to_reg(register, &current);
            if let Operand::Memory(label) = &*current {
                self.spills.release(label);
            }
        }
        *op.borrow_mut() = Operand::Register(register);
        register
    }

    /// Consume a right-hand or statement-level operand, returning whatever
    /// resource it held.
    fn release_operand(&mut self, op: OperandSlot) {
        match &*op.borrow() {
            Operand::Register(register) => self.registers.deallocate_register(*register),
            Operand::Memory(label) => self.spills.release(label),
            Operand::Immediate(_) => {}
        }
    }

    /// Lower `left ⊕ right` into a 2-address instruction. The left operand
    /// becomes the destination register and the result location; the right
    /// operand is read in whatever form it has by then (a spill while the
    /// left materializes can demote it to memory).
    fn emit_binary(
        &mut self,
        inst: BinaryInst,
        left: &OperandSlot,
        right: &OperandSlot,
    ) -> Register {
        let register = self.materialize(left);
        self.last_register_op = Some(Rc::clone(left));
        self.emitter.emit_2addr(inst, register, &right.borrow());
        register
    }

    // ----- Productions -----

    /// PROGRAM -> program identifier ; DECL_LIST BLOCK ;
    pub fn parse_program(&mut self) -> CompileResult<()> {
        self.trace("PROGRAM -> program identifier ; DECL_LIST BLOCK ;");
        self.expect_keyword(Keyword::Program, "keyword program")?;

        let Some(name) = self.ident_attr() else {
            return Err(self.syntax_error("identifier"));
        };
        self.stab.install(&name, EXTERNAL_ENV, ExprType::Program);
        self.current_env = name.clone();
        self.main_env = name.clone();
        self.emitter.emit_label(&format!("_{name}"));
        self.advance();

        self.expect_punct(Punct::Semicolon, "';'")?;
        self.parse_decl_list()?;
        if self.trace_enabled {
            eprintln!("{}", self.stab.dump());
        }
        self.parse_block()?;
        self.expect_punct(Punct::Semicolon, "';'")?;

        self.emitter.emit_halt();
        if !self.program_labels.is_empty() {
            self.emitter
                .emit_comment("Data directives for program variables.");
            for label in &self.program_labels {
                self.emitter.emit_data_directive(label, 1);
            }
        }
        if !self.spills.is_empty() {
            self.emitter
                .emit_comment("Data directives for spilled memories.");
            let labels: Vec<String> = self.spills.labels().map(str::to_string).collect();
            for label in &labels {
                self.emitter.emit_data_directive(label, 1);
            }
        }
        Ok(())
    }

    /// DECL_LIST -> VARIABLE_DECL_LIST PROCEDURE_DECL_LIST
    fn parse_decl_list(&mut self) -> CompileResult<()> {
        self.trace("DECL_LIST -> VARIABLE_DECL_LIST PROCEDURE_DECL_LIST");
        self.parse_variable_decl_list()?;
        self.parse_procedure_decl_list()
    }

    /// VARIABLE_DECL_LIST -> VARIABLE_DECL ; VARIABLE_DECL_LIST | lambda
    fn parse_variable_decl_list(&mut self) -> CompileResult<()> {
        if !self.at_ident() {
            self.trace("VARIABLE_DECL_LIST -> lambda");
            return Ok(());
        }
        self.trace("VARIABLE_DECL_LIST -> VARIABLE_DECL ; VARIABLE_DECL_LIST");
        self.parse_variable_decl()?;
        self.expect_punct(Punct::Semicolon, "';'")?;
        self.parse_variable_decl_list()
    }

    /// VARIABLE_DECL -> IDENTIFIER_LIST : STANDARD_TYPE
    fn parse_variable_decl(&mut self) -> CompileResult<()> {
        if !self.at_ident() {
            return Err(self.syntax_error("identifier"));
        }
        self.trace("VARIABLE_DECL -> IDENTIFIER_LIST : STANDARD_TYPE");
        self.parse_identifier_list()?;
        self.expect_punct(Punct::Colon, "':'")?;
        let ty = self.parse_standard_type()?;
        self.stab.update_type(ty);
        Ok(())
    }

    /// IDENTIFIER_LIST -> identifier IDENTIFIER_LIST_PRM
    fn parse_identifier_list(&mut self) -> CompileResult<()> {
        let Some(name) = self.ident_attr() else {
            return Err(self.syntax_error("identifier"));
        };
        self.trace("IDENTIFIER_LIST -> identifier IDENTIFIER_LIST_PRM");
        if self.stab.is_decl(&name, &self.current_env) {
            self.multiply_defined(&name)?;
        } else {
            self.stab.install(&name, &self.current_env, ExprType::Unknown);
        }
        if self.current_env == self.main_env {
            self.program_labels.push(name);
        }
        self.advance();
        self.parse_identifier_list_prm()
    }

    /// IDENTIFIER_LIST_PRM -> , identifier IDENTIFIER_LIST_PRM | lambda
    fn parse_identifier_list_prm(&mut self) -> CompileResult<()> {
        if !self.at_punct(Punct::Comma) {
            self.trace("IDENTIFIER_LIST_PRM -> lambda");
            return Ok(());
        }
        self.trace("IDENTIFIER_LIST_PRM -> , identifier IDENTIFIER_LIST_PRM");
        self.advance();

        let Some(name) = self.ident_attr() else {
            return Err(self.syntax_error("identifier"));
        };
        if self.stab.is_decl(&name, &self.current_env) {
            self.multiply_defined(&name)?;
        } else if self.parsing_formal_parm_list {
            self.stab.install_formal(
                &name,
                &self.current_env,
                ExprType::Unknown,
                self.formal_parm_position,
            );
            self.formal_parm_position += 1;
        } else {
            self.stab.install(&name, &self.current_env, ExprType::Unknown);
        }
        if self.current_env == self.main_env {
            self.program_labels.push(name);
        }
        self.advance();
        self.parse_identifier_list_prm()
    }

    /// STANDARD_TYPE -> int | bool
    fn parse_standard_type(&mut self) -> CompileResult<ExprType> {
        if self.at_keyword(Keyword::Int) {
            self.trace("STANDARD_TYPE -> int");
            self.advance();
            Ok(ExprType::Int)
        } else if self.at_keyword(Keyword::Bool) {
            self.trace("STANDARD_TYPE -> bool");
            self.advance();
            Ok(ExprType::Bool)
        } else {
            Err(self.syntax_error("int or bool"))
        }
    }

    /// PROCEDURE_DECL_LIST -> PROCEDURE_DECL ; PROCEDURE_DECL_LIST | lambda
    fn parse_procedure_decl_list(&mut self) -> CompileResult<()> {
        if !self.at_keyword(Keyword::Procedure) {
            self.trace("PROCEDURE_DECL_LIST -> lambda");
            return Ok(());
        }
        self.trace("PROCEDURE_DECL_LIST -> PROCEDURE_DECL ; PROCEDURE_DECL_LIST");
        self.parse_procedure_decl()?;
        self.expect_punct(Punct::Semicolon, "';'")?;
        self.parse_procedure_decl_list()
    }

    /// PROCEDURE_DECL -> procedure identifier ( PROCEDURE_ARGS ) VARIABLE_DECL_LIST BLOCK
    fn parse_procedure_decl(&mut self) -> CompileResult<()> {
        self.trace(
            "PROCEDURE_DECL -> procedure identifier ( PROCEDURE_ARGS ) VARIABLE_DECL_LIST BLOCK",
        );
        self.expect_keyword(Keyword::Procedure, "procedure")?;

        let Some(name) = self.ident_attr() else {
            return Err(self.syntax_error("identifier"));
        };
        if self.stab.is_decl(&name, &self.current_env) {
            self.multiply_defined(&name)?;
        } else {
            self.stab.install(&name, &self.current_env, ExprType::Procedure);
            self.current_env = name;
            self.formal_parm_position = 0;
        }
        self.advance();

        // The environment must come back to program scope on every exit
        // path, including partial parses in lenient mode.
        let body = self.parse_procedure_tail();
        self.current_env = self.main_env.clone();
        body
    }

    fn parse_procedure_tail(&mut self) -> CompileResult<()> {
        self.expect_punct(Punct::Open, "'('")?;
        self.parse_procedure_args()?;
        self.expect_punct(Punct::Close, "')'")?;
        self.parse_variable_decl_list()?;
        self.parse_block()
    }

    /// PROCEDURE_ARGS -> FORMAL_PARM_LIST | lambda
    fn parse_procedure_args(&mut self) -> CompileResult<()> {
        if !self.at_ident() {
            self.trace("PROCEDURE_ARGS -> lambda");
            return Ok(());
        }
        self.trace("PROCEDURE_ARGS -> FORMAL_PARM_LIST");
        self.parsing_formal_parm_list = true;
        let result = self.parse_formal_parm_list();
        self.parsing_formal_parm_list = false;
        result
    }

    /// FORMAL_PARM_LIST -> identifier IDENTIFIER_LIST_PRM : STANDARD_TYPE FORMAL_PARM_LIST_HAT
    fn parse_formal_parm_list(&mut self) -> CompileResult<()> {
        let Some(name) = self.ident_attr() else {
            return Err(self.syntax_error("identifier"));
        };
        self.trace(
            "FORMAL_PARM_LIST -> identifier IDENTIFIER_LIST_PRM : STANDARD_TYPE FORMAL_PARM_LIST_HAT",
        );
        if self.stab.is_decl(&name, &self.current_env) {
            self.multiply_defined(&name)?;
        } else {
            self.stab.install_formal(
                &name,
                &self.current_env,
                ExprType::Unknown,
                self.formal_parm_position,
            );
            self.formal_parm_position += 1;
        }
        self.advance();

        self.parse_identifier_list_prm()?;
        self.expect_punct(Punct::Colon, "':'")?;
        let ty = self.parse_standard_type()?;
        self.stab.update_type(ty);
        self.parse_formal_parm_list_hat()
    }

    /// FORMAL_PARM_LIST_HAT -> ; FORMAL_PARM_LIST | lambda
    fn parse_formal_parm_list_hat(&mut self) -> CompileResult<()> {
        if !self.at_punct(Punct::Semicolon) {
            self.trace("FORMAL_PARM_LIST_HAT -> lambda");
            return Ok(());
        }
        self.trace("FORMAL_PARM_LIST_HAT -> ; FORMAL_PARM_LIST");
        self.advance();
        self.parse_formal_parm_list()
    }

    /// BLOCK -> begin STMT_LIST end
    fn parse_block(&mut self) -> CompileResult<()> {
        self.trace("BLOCK -> begin STMT_LIST end");
        self.expect_keyword(Keyword::Begin, "begin")?;
        self.parse_stmt_list()?;
        self.expect_keyword(Keyword::End, "end")
    }

    /// STMT_LIST -> STMT ; STMT_LIST_PRM | ; STMT_LIST_PRM
    fn parse_stmt_list(&mut self) -> CompileResult<()> {
        if self.at_stmt_start() {
            self.trace("STMT_LIST -> STMT ; STMT_LIST_PRM");
            self.parse_stmt()?;
            self.expect_punct(Punct::Semicolon, "';'")?;
            self.parse_stmt_list_prm()
        } else if self.at_punct(Punct::Semicolon) {
            self.trace("STMT_LIST -> ; STMT_LIST_PRM");
            self.advance();
            self.parse_stmt_list_prm()
        } else {
            Err(self.syntax_error("statement or ';'"))
        }
    }

    /// STMT_LIST_PRM -> STMT ; STMT_LIST_PRM | lambda
    fn parse_stmt_list_prm(&mut self) -> CompileResult<()> {
        if !self.at_stmt_start() {
            self.trace("STMT_LIST_PRM -> lambda");
            return Ok(());
        }
        self.trace("STMT_LIST_PRM -> STMT ; STMT_LIST_PRM");
        self.parse_stmt()?;
        self.expect_punct(Punct::Semicolon, "';'")?;
        self.parse_stmt_list_prm()
    }

    /// STMT -> IF_STMT | WHILE_STMT | PRINT_STMT | identifier ASSIGN_OR_CALL_TAIL
    fn parse_stmt(&mut self) -> CompileResult<()> {
        if self.at_keyword(Keyword::If) {
            self.trace("STMT -> IF_STMT");
            return self.parse_if_stmt();
        }
        if self.at_keyword(Keyword::While) {
            self.trace("STMT -> WHILE_STMT");
            return self.parse_while_stmt();
        }
        if self.at_keyword(Keyword::Print) {
            self.trace("STMT -> PRINT_STMT");
            return self.parse_print_stmt();
        }
        let Some(name) = self.ident_attr() else {
            return Err(self.syntax_error("statement"));
        };
        self.trace("STMT -> identifier ASSIGN_OR_CALL_TAIL");

        if !self.stab.is_decl(&name, &self.current_env) {
            self.undeclared(&name)?;
        } else {
            self.callee_name = name.clone();
        }
        self.advance();

        let (tail_ty, expr_op) = self.parse_assign_or_call_tail()?;

        let id_ty = self.stab.get_type(&name, &self.current_env);
        if tail_ty != id_ty {
            self.type_mismatch(id_ty, tail_ty)?;
        }

        // Assignment stores the expression value; a call leaves no IR.
        if id_ty != ExprType::Procedure {
            if let Some(op) = expr_op {
                let register = self.materialize(&op);
                self.emitter.emit_move_to_mem(&name, register);
                self.registers.deallocate_register(register);
            }
        } else if let Some(op) = expr_op {
            self.release_operand(op);
        }
        Ok(())
    }

    /// ASSIGN_OR_CALL_TAIL -> := EXPR | ( EXPR_LIST )
    ///
    /// Returns the synthesized statement-tail type, plus the expression
    /// operand for the assignment form.
    fn parse_assign_or_call_tail(&mut self) -> CompileResult<(ExprType, Option<OperandSlot>)> {
        if self.at_punct(Punct::Assign) {
            self.trace("ASSIGN_OR_CALL_TAIL -> := EXPR");
            self.advance();
            let (ty, op) = self.parse_expr()?;
            Ok((ty, Some(op)))
        } else if self.at_punct(Punct::Open) {
            self.trace("ASSIGN_OR_CALL_TAIL -> ( EXPR_LIST )");
            let callee_ty = self.stab.get_type(&self.callee_name, &self.main_env);
            if callee_ty != ExprType::Procedure {
                self.type_mismatch(ExprType::Procedure, callee_ty)?;
            }
            self.actual_parm_position = 0;
            self.advance();
            self.parse_expr_list()?;
            self.expect_punct(Punct::Close, "')'")?;
            Ok((ExprType::Procedure, None))
        } else {
            Err(self.syntax_error("':=' or '('"))
        }
    }

    /// IF_STMT -> if EXPR then BLOCK IF_STMT_HAT
    fn parse_if_stmt(&mut self) -> CompileResult<()> {
        self.trace("IF_STMT -> if EXPR then BLOCK IF_STMT_HAT");
        self.expect_keyword(Keyword::If, "if")?;

        let (cond_ty, cond) = self.parse_expr()?;
        if cond_ty != ExprType::Bool {
            self.type_mismatch(ExprType::Bool, cond_ty)?;
        }
        let register = self.materialize(&cond);

        let else_part = self.emitter.new_label("else");
        let if_done = self.emitter.new_label("if_done");
        self.emitter
            .emit_branch_if(BranchCond::Brez, register, &else_part);
        self.registers.deallocate_register(register);

        self.expect_keyword(Keyword::Then, "then")?;
        self.parse_block()?;
        self.emitter.emit_branch(&if_done);
        self.emitter.emit_label(&else_part);
        self.parse_if_stmt_hat()?;
        self.emitter.emit_label(&if_done);
        Ok(())
    }

    /// IF_STMT_HAT -> else BLOCK | lambda
    fn parse_if_stmt_hat(&mut self) -> CompileResult<()> {
        if !self.at_keyword(Keyword::Else) {
            self.trace("IF_STMT_HAT -> lambda");
            return Ok(());
        }
        self.trace("IF_STMT_HAT -> else BLOCK");
        self.advance();
        self.parse_block()
    }

    /// WHILE_STMT -> while EXPR loop BLOCK
    fn parse_while_stmt(&mut self) -> CompileResult<()> {
        self.trace("WHILE_STMT -> while EXPR loop BLOCK");
        self.expect_keyword(Keyword::While, "while")?;

        let while_cond = self.emitter.new_label("while_cond");
        let while_done = self.emitter.new_label("while_done");
        self.emitter.emit_label(&while_cond);

        let (cond_ty, cond) = self.parse_expr()?;
        if cond_ty != ExprType::Bool {
            self.type_mismatch(ExprType::Bool, cond_ty)?;
        }
        let register = self.materialize(&cond);
        self.emitter
            .emit_branch_if(BranchCond::Brez, register, &while_done);
        self.registers.deallocate_register(register);

        self.expect_keyword(Keyword::Loop, "loop")?;
        self.parse_block()?;
        self.emitter.emit_branch(&while_cond);
        self.emitter.emit_label(&while_done);
        Ok(())
    }

    /// PRINT_STMT -> print EXPR
    fn parse_print_stmt(&mut self) -> CompileResult<()> {
        self.trace("PRINT_STMT -> print EXPR");
        self.expect_keyword(Keyword::Print, "print")?;

        let (ty, op) = self.parse_expr()?;
        if ty != ExprType::Int && ty != ExprType::Bool {
            self.type_mismatch_either(ExprType::Int, ExprType::Bool, ty)?;
        }
        let register = self.materialize(&op);
        self.emitter.emit_1addr(UnaryInst::Outb, register);
        self.registers.deallocate_register(register);
        Ok(())
    }

    /// EXPR_LIST -> ACTUAL_PARM_LIST | lambda
    fn parse_expr_list(&mut self) -> CompileResult<()> {
        if self.at_expr_start() {
            self.trace("EXPR_LIST -> ACTUAL_PARM_LIST");
            self.parse_actual_parm_list()
        } else {
            self.trace("EXPR_LIST -> lambda");
            Ok(())
        }
    }

    /// ACTUAL_PARM_LIST -> EXPR ACTUAL_PARM_LIST_HAT
    fn parse_actual_parm_list(&mut self) -> CompileResult<()> {
        self.trace("ACTUAL_PARM_LIST -> EXPR ACTUAL_PARM_LIST_HAT");
        let (ty, op) = self.parse_expr()?;
        let expected = self
            .stab
            .formal_type(&self.callee_name, self.actual_parm_position);
        if ty != expected {
            self.type_mismatch(expected, ty)?;
        }
        self.actual_parm_position += 1;
        self.release_operand(op);
        self.parse_actual_parm_list_hat()
    }

    /// ACTUAL_PARM_LIST_HAT -> , ACTUAL_PARM_LIST | lambda
    fn parse_actual_parm_list_hat(&mut self) -> CompileResult<()> {
        if !self.at_punct(Punct::Comma) {
            self.trace("ACTUAL_PARM_LIST_HAT -> lambda");
            return Ok(());
        }
        self.trace("ACTUAL_PARM_LIST_HAT -> , ACTUAL_PARM_LIST");
        self.advance();
        self.parse_actual_parm_list()
    }

    /// EXPR -> SIMPLE_EXPR EXPR_HAT
    fn parse_expr(&mut self) -> CompileResult<(ExprType, OperandSlot)> {
        self.trace("EXPR -> SIMPLE_EXPR EXPR_HAT");
        let (simple_ty, op) = self.parse_simple_expr()?;
        let hat_ty = self.parse_expr_hat(&op)?;

        let ty = if hat_ty == ExprType::No {
            simple_ty
        } else if simple_ty == ExprType::Int && hat_ty == ExprType::Int {
            ExprType::Bool
        } else {
            self.type_mismatch_either(ExprType::Int, simple_ty, hat_ty)?;
            ExprType::Garbage
        };
        Ok((ty, op))
    }

    /// EXPR_HAT -> relop SIMPLE_EXPR | lambda
    ///
    /// A comparison subtracts the operands and normalizes the register to
    /// 0 or 1 by branching on the sign of the difference.
    fn parse_expr_hat(&mut self, left: &OperandSlot) -> CompileResult<ExprType> {
        let Some(relop) = self.relop_attr() else {
            self.trace("EXPR_HAT -> lambda");
            return Ok(ExprType::No);
        };
        self.trace("EXPR_HAT -> relop SIMPLE_EXPR");
        self.advance();

        let (simple_ty, right) = self.parse_simple_expr()?;
        let hat_ty = if simple_ty == ExprType::Int {
            ExprType::Int
        } else {
            self.type_mismatch(ExprType::Int, simple_ty)?;
            ExprType::Garbage
        };

        let register = self.materialize(left);
        self.last_register_op = Some(Rc::clone(left));
        self.emitter
            .emit_comment("Compare two values by examining their difference.");
        self.emitter
            .emit_2addr(BinaryInst::Sub, register, &right.borrow());

        let compare_false = self.emitter.new_label("compare_false");
        let compare_done = self.emitter.new_label("compare_done");
        self.emitter
            .emit_comment("Normalize result of comparison to 0 or 1.");
        for cond in Self::false_branches(relop) {
            self.emitter.emit_branch_if(*cond, register, &compare_false);
        }
        self.emitter
            .emit_move_to_reg(register, &Operand::Immediate(1));
        self.emitter.emit_branch(&compare_done);
        self.emitter.emit_label(&compare_false);
        self.emitter
            .emit_move_to_reg(register, &Operand::Immediate(0));
        self.emitter.emit_label(&compare_done);

        self.release_operand(right);
        Ok(hat_ty)
    }

    /// Branches that route to `compare_false`, keyed by what the comparison
    /// treats as false in the sign of `left - right`.
    fn false_branches(relop: RelOp) -> &'static [BranchCond] {
        match relop {
            RelOp::Eq => &[BranchCond::Brne, BranchCond::Brpo],
            RelOp::Ne => &[BranchCond::Brez],
            RelOp::Gt => &[BranchCond::Brne, BranchCond::Brez],
            RelOp::Ge => &[BranchCond::Brne],
            RelOp::Lt => &[BranchCond::Brez, BranchCond::Brpo],
            RelOp::Le => &[BranchCond::Brpo],
        }
    }

    /// SIMPLE_EXPR -> TERM SIMPLE_EXPR_PRM
    fn parse_simple_expr(&mut self) -> CompileResult<(ExprType, OperandSlot)> {
        self.trace("SIMPLE_EXPR -> TERM SIMPLE_EXPR_PRM");
        let (term_ty, op) = self.parse_term()?;
        let prm_ty = self.parse_simple_expr_prm(&op)?;

        let ty = if prm_ty == ExprType::No || term_ty == prm_ty {
            term_ty
        } else {
            self.type_mismatch(term_ty, prm_ty)?;
            ExprType::Garbage
        };
        Ok((ty, op))
    }

    /// SIMPLE_EXPR_PRM -> addop TERM SIMPLE_EXPR_PRM | lambda
    fn parse_simple_expr_prm(&mut self, left: &OperandSlot) -> CompileResult<ExprType> {
        let Some(addop) = self.addop_attr() else {
            self.trace("SIMPLE_EXPR_PRM -> lambda");
            return Ok(ExprType::No);
        };
        self.trace("SIMPLE_EXPR_PRM -> addop TERM SIMPLE_EXPR_PRM");
        let addop_ty = match addop {
            AddOp::Add | AddOp::Sub => ExprType::Int,
            AddOp::Or => ExprType::Bool,
        };
        self.advance();

        let (term_ty, right) = self.parse_term()?;

        let inst = match addop {
            AddOp::Add | AddOp::Or => BinaryInst::Add,
            AddOp::Sub => BinaryInst::Sub,
        };
        let register = self.emit_binary(inst, left, &right);

        // ADD of two truth values can leave 2 in the register.
        if addop == AddOp::Or {
            self.emitter
                .emit_comment("Normalize result of OR operation to 0 or 1.");
            let or_done = self.emitter.new_label("or_done");
            self.emitter
                .emit_branch_if(BranchCond::Brez, register, &or_done);
            self.emitter
                .emit_move_to_reg(register, &Operand::Immediate(1));
            self.emitter.emit_label(&or_done);
        }

        self.release_operand(right);

        let tail_ty = self.parse_simple_expr_prm(left)?;
        let ty = if tail_ty == ExprType::No {
            if addop_ty == term_ty {
                addop_ty
            } else {
                self.type_mismatch(addop_ty, term_ty)?;
                ExprType::Garbage
            }
        } else if addop_ty == term_ty && term_ty == tail_ty {
            addop_ty
        } else {
            self.type_mismatch_either(addop_ty, term_ty, tail_ty)?;
            ExprType::Garbage
        };
        Ok(ty)
    }

    /// TERM -> FACTOR TERM_PRM
    fn parse_term(&mut self) -> CompileResult<(ExprType, OperandSlot)> {
        self.trace("TERM -> FACTOR TERM_PRM");
        let (factor_ty, op) = self.parse_factor()?;
        let prm_ty = self.parse_term_prm(&op)?;

        let ty = if prm_ty == ExprType::No || factor_ty == prm_ty {
            factor_ty
        } else {
            self.type_mismatch(factor_ty, prm_ty)?;
            ExprType::Garbage
        };
        Ok((ty, op))
    }

    /// TERM_PRM -> mulop FACTOR TERM_PRM | lambda
    fn parse_term_prm(&mut self, left: &OperandSlot) -> CompileResult<ExprType> {
        let Some(mulop) = self.mulop_attr() else {
            self.trace("TERM_PRM -> lambda");
            return Ok(ExprType::No);
        };
        self.trace("TERM_PRM -> mulop FACTOR TERM_PRM");
        let mulop_ty = match mulop {
            MulOp::Mul | MulOp::Div => ExprType::Int,
            MulOp::And => ExprType::Bool,
        };
        self.advance();

        let (factor_ty, right) = self.parse_factor()?;

        let inst = match mulop {
            MulOp::Mul | MulOp::And => BinaryInst::Mul,
            MulOp::Div => BinaryInst::Div,
        };
        self.emit_binary(inst, left, &right);
        self.release_operand(right);

        let tail_ty = self.parse_term_prm(left)?;
        let ty = if tail_ty == ExprType::No && mulop_ty == factor_ty {
            mulop_ty
        } else if mulop_ty == factor_ty && factor_ty == tail_ty {
            mulop_ty
        } else if tail_ty == ExprType::No {
            self.type_mismatch(mulop_ty, factor_ty)?;
            ExprType::Garbage
        } else {
            self.type_mismatch_either(mulop_ty, factor_ty, tail_ty)?;
            ExprType::Garbage
        };
        Ok(ty)
    }

    /// FACTOR -> identifier | num | ( EXPR ) | SIGN FACTOR
    fn parse_factor(&mut self) -> CompileResult<(ExprType, OperandSlot)> {
        if let Some(name) = self.ident_attr() {
            self.trace("FACTOR -> identifier");
            let mut ty = ExprType::Garbage;
            if !self.stab.is_decl(&name, &self.current_env) {
                self.undeclared(&name)?;
            } else {
                ty = self.stab.get_type(&name, &self.current_env);
            }
            let op = Operand::Memory(name).into_slot();
            self.advance();
            Ok((ty, op))
        } else if let Token::Num(value) = self.lookahead {
            self.trace("FACTOR -> number");
            let op = Operand::Immediate(value).into_slot();
            self.advance();
            Ok((ExprType::Int, op))
        } else if self.at_punct(Punct::Open) {
            self.trace("FACTOR -> ( EXPR )");
            self.advance();
            let (ty, op) = self.parse_expr()?;
            self.expect_punct(Punct::Close, "')'")?;
            Ok((ty, op))
        } else if self.at_addop(AddOp::Add)
            || self.at_addop(AddOp::Sub)
            || self.at_keyword(Keyword::Not)
        {
            self.trace("FACTOR -> SIGN FACTOR");
            let negate_inst = if self.at_addop(AddOp::Sub) {
                Some(UnaryInst::Neg)
            } else if self.at_keyword(Keyword::Not) {
                Some(UnaryInst::Not)
            } else {
                None
            };
            let sign_ty = self.parse_sign()?;
            let (factor_ty, op) = self.parse_factor()?;
            if sign_ty != factor_ty {
                self.type_mismatch(sign_ty, factor_ty)?;
            }

            // Unary plus is a no-op; NEG and NOT need their operand in a
            // register first.
            if let Some(inst) = negate_inst {
                let register = self.materialize(&op);
                self.last_register_op = Some(Rc::clone(&op));
                self.emitter.emit_1addr(inst, register);
            }
            Ok((factor_ty, op))
        } else {
            Err(self.syntax_error("identifier, number, '(', or sign"))
        }
    }

    /// SIGN -> + | - | not
    fn parse_sign(&mut self) -> CompileResult<ExprType> {
        if self.at_addop(AddOp::Add) {
            self.trace("SIGN -> +");
            self.advance();
            Ok(ExprType::Int)
        } else if self.at_addop(AddOp::Sub) {
            self.trace("SIGN -> -");
            self.advance();
            Ok(ExprType::Int)
        } else if self.at_keyword(Keyword::Not) {
            self.trace("SIGN -> not");
            self.advance();
            Ok(ExprType::Bool)
        } else {
            Err(self.syntax_error("'+', '-', or not"))
        }
    }
}
