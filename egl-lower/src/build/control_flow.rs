//! Control-flow statement lowering (`spec.md` §4.3.1/§4.3.2): `if`/`else
//! if`/`else` chains with a shared merge block, `for`/`while` loops, and
//! `return`/`break`/`continue`.

use super::{FunctionLowerer, LoopBlockInfo, LowerResult, Typed};
use crate::env::GlobalEnv;
use egl_ast::{BinOpCode, Node, NodeKind};
use egl_ir::{
    BasicBlock, BinOp, BlockAnd, BlockAndExtend, Const, Operand, Place, RValue, RuntimeCall,
    StatementKind, TerminatorKind,
};
use egl_reporting::{die, ErrorKind};
use egl_types::Type;

impl<'a, E: GlobalEnv> FunctionLowerer<'a, E> {
    /// `r expr` / bare `r`: coerce to the function's return type, transfer
    /// ownership (increment a returned counted pointer, since the callee's
    /// local is about to be torn down by the scope-exit callbacks below),
    /// run every outstanding scope-exit callback up to and including the
    /// function scope, then terminate the block.
    pub(super) fn lower_return(
        &mut self,
        block: BasicBlock,
        node: &Node,
        operand: &Node,
    ) -> LowerResult<BlockAnd<Typed<Operand>>> {
        let return_ty = self.return_ty();
        let is_void = matches!(self.env.registry().get(return_ty), Type::Void | Type::None);

        let operand_and = self.lower_operand(block, operand)?;
        let mut block = operand_and.block;

        if !is_void {
            let Typed { value, ty } = operand_and.value;
            let value = self.coerce_operand(block, value, ty, return_ty, node.line)?;

            let consumed = self.transients.take_loaded(operand).is_some();
            self.transients.take_transient(operand);

            if self.env.registry().is_counted(return_ty) && !consumed {
                if let Some(place) = value.place() {
                    self.cfg.push_statement(
                        block,
                        StatementKind::Runtime(RuntimeCall::IncrPtr(Operand::Copy(place.clone()))),
                        node.line,
                    );
                }
            }

            self.cfg.push_assign(block, Place::return_place(), RValue::Use(value), node.line);
        } else {
            self.transients.take_loaded(operand);
            self.transients.take_transient(operand);
        }

        self.flush_transients(block, node.line);
        self.scopes.run_callbacks_through(self.function_scope, &mut self.cfg, block, node.line);
        self.cfg.set_terminator(block, TerminatorKind::Return, node.line);

        block = self.cfg.start_new_block();
        let void_ty = self.env.registry().void_type();
        node.set_resultant_type(void_ty);
        Ok(block.and(Typed { value: Operand::Constant(Const::Zero), ty: void_ty }))
    }

    /// Flatten a left-leaning `&&`/`||` chain and lower it as a series of
    /// tests feeding a single merge block, each writing the chain's result
    /// into one shared local (`spec.md` §4.3.2's "one phi node of width 2"
    /// for the two-operand case — modelled here as a mutable local since
    /// this IR has no explicit phi instruction).
    pub(super) fn lower_short_circuit(
        &mut self,
        block: BasicBlock,
        node: &Node,
        op: BinOpCode,
        _left: &Node,
        _right: &Node,
    ) -> LowerResult<BlockAnd<Typed<Operand>>> {
        let chain = flatten_chain(op, node);
        let bool_ty = self.env.registry().int1();
        let result_local = self.new_temp(bool_ty);
        let result_place = Place::from_local(result_local);
        let merge = self.cfg.start_new_block();
        let short_circuits_on = matches!(op, BinOpCode::Or);

        let mut block = block;
        for (i, expr) in chain.iter().enumerate() {
            let operand_and = self.lower_operand(block, expr)?;
            block = operand_and.block;
            let Typed { value, ty } = operand_and.value;
            let test_and = self.lower_test(block, value, ty, expr.line)?;
            block = test_and.block;
            self.flush_transients(block, expr.line);

            if i + 1 == chain.len() {
                self.cfg.push_assign(block, result_place.clone(), RValue::Use(test_and.value), expr.line);
                self.cfg.goto(block, merge, expr.line);
            } else {
                let next_test = self.cfg.start_new_block();
                let short_circuit_block = self.cfg.start_new_block();
                let (then_block, else_block) = if short_circuits_on {
                    (short_circuit_block, next_test)
                } else {
                    (next_test, short_circuit_block)
                };
                self.cfg.set_terminator(
                    block,
                    TerminatorKind::If { condition: test_and.value, then_block, else_block },
                    expr.line,
                );
                self.cfg.push_assign(
                    short_circuit_block,
                    result_place.clone(),
                    RValue::Use(Operand::Constant(Const::Bool(short_circuits_on))),
                    expr.line,
                );
                self.cfg.goto(short_circuit_block, merge, expr.line);
                block = next_test;
            }
        }

        node.set_resultant_type(bool_ty);
        Ok(merge.and(Typed { value: Operand::Copy(result_place), ty: bool_ty }))
    }

    /// `if test { ... } [else if ... | else ...]` — one shared merge block
    /// for the whole chain; an arm that already terminates (e.g. its last
    /// statement was `return`) does not branch to the merge block.
    pub(super) fn lower_if_block(&mut self, block: BasicBlock, node: &Node) -> LowerResult<BlockAnd<()>> {
        let NodeKind::IfBlock { test, block: body, if_next } = &node.kind else {
            die!(ErrorKind::InternalCompilerError, node.line, "expected an if-block node");
        };
        let merge = self.cfg.start_new_block();
        self.lower_if_arm(block, test, body, if_next.as_deref(), merge)?;
        Ok(merge.and(()))
    }

    fn lower_if_arm(
        &mut self,
        block: BasicBlock,
        test: &Node,
        body: &[Node],
        if_next: Option<&Node>,
        merge: BasicBlock,
    ) -> LowerResult<()> {
        let operand_and = self.lower_operand(block, test)?;
        let block = operand_and.block;
        let Typed { value, ty } = operand_and.value;
        let test_and = self.lower_test(block, value, ty, test.line)?;
        let block = test_and.block;
        self.flush_transients(block, test.line);

        let then_block = self.cfg.start_new_block();
        let else_block = self.cfg.start_new_block();
        self.cfg.set_terminator(
            block,
            TerminatorKind::If { condition: test_and.value, then_block, else_block },
            test.line,
        );

        let arm_scope = self.scopes.push();
        let mut cur = then_block;
        for stmt in body {
            cur = self.lower_statement(cur, stmt)?;
        }
        if !self.cfg.is_terminated(cur) {
            self.scopes.run_callbacks_through(arm_scope, &mut self.cfg, cur, test.line);
            self.cfg.goto(cur, merge, test.line);
        }
        self.scopes.pop();

        match if_next {
            Some(next) => {
                let NodeKind::IfBlock { test: next_test, block: next_body, if_next: next_next } = &next.kind
                else {
                    die!(ErrorKind::InternalCompilerError, next.line, "`else` arm is not an if-block node");
                };
                self.lower_if_arm(else_block, next_test, next_body, next_next.as_deref(), merge)
            }
            None => {
                self.cfg.goto(else_block, merge, test.line);
                Ok(())
            }
        }
    }

    /// `for (setup; test; update) { body }` / `while (test) { body }`
    /// (`setup`/`update` absent for `while`, `test` absent means "loop
    /// forever until `break`"). The setup clause's declarations outlive
    /// every iteration; the body's do not (`continue` tears those down each
    /// time, `break` tears down both, `spec.md` §4.3.1).
    pub(super) fn lower_loop(&mut self, block: BasicBlock, node: &Node) -> LowerResult<BlockAnd<()>> {
        let NodeKind::Loop { setup, test, update, block: body } = &node.kind else {
            die!(ErrorKind::InternalCompilerError, node.line, "expected a loop node");
        };

        let loop_scope = self.scopes.push();
        let mut block = block;
        if let Some(setup) = setup {
            block = self.lower_statement(block, setup)?;
        }

        let header = self.cfg.start_new_block();
        self.cfg.goto(block, header, node.line);

        let merge = self.cfg.start_new_block();
        let continue_block = self.cfg.start_new_block();

        let body_block = if let Some(test) = test {
            let operand_and = self.lower_operand(header, test)?;
            let test_block = operand_and.block;
            let Typed { value, ty } = operand_and.value;
            let test_and = self.lower_test(test_block, value, ty, test.line)?;
            let test_block = test_and.block;
            self.flush_transients(test_block, test.line);

            let body_block = self.cfg.start_new_block();
            let exit_block = self.cfg.start_new_block();
            self.cfg.set_terminator(
                test_block,
                TerminatorKind::If { condition: test_and.value, then_block: body_block, else_block: exit_block },
                test.line,
            );
            self.scopes.run_callbacks_through(loop_scope, &mut self.cfg, exit_block, node.line);
            self.cfg.goto(exit_block, merge, node.line);
            body_block
        } else {
            let body_block = self.cfg.start_new_block();
            self.cfg.goto(header, body_block, node.line);
            body_block
        };

        let body_scope = self.scopes.push();
        self.loops.push(LoopBlockInfo { body_scope, loop_scope, continue_block, merge_block: merge });

        let mut cur = body_block;
        for stmt in body {
            cur = self.lower_statement(cur, stmt)?;
        }
        if !self.cfg.is_terminated(cur) {
            self.scopes.run_callbacks_through(body_scope, &mut self.cfg, cur, node.line);
            self.cfg.goto(cur, continue_block, node.line);
        }
        self.scopes.pop();
        self.loops.pop();

        let mut update_cur = continue_block;
        if let Some(update) = update {
            update_cur = self.lower_statement(update_cur, update)?;
        }
        self.cfg.goto(update_cur, header, node.line);

        self.scopes.pop();
        Ok(merge.and(()))
    }

    pub(super) fn lower_break(&mut self, block: BasicBlock, node: &Node) -> LowerResult<BasicBlock> {
        let Some(info) = self.loops.last() else {
            die!(ErrorKind::InternalCompilerError, node.line, "`break` used outside of a loop");
        };
        let (loop_scope, merge_block) = (info.loop_scope, info.merge_block);
        self.scopes.run_callbacks_through(loop_scope, &mut self.cfg, block, node.line);
        self.cfg.goto(block, merge_block, node.line);
        Ok(block)
    }

    pub(super) fn lower_continue(&mut self, block: BasicBlock, node: &Node) -> LowerResult<BasicBlock> {
        let Some(info) = self.loops.last() else {
            die!(ErrorKind::InternalCompilerError, node.line, "`continue` used outside of a loop");
        };
        let (body_scope, continue_block) = (info.body_scope, info.continue_block);
        self.scopes.run_callbacks_through(body_scope, &mut self.cfg, block, node.line);
        self.cfg.goto(block, continue_block, node.line);
        Ok(block)
    }
}

fn flatten_chain(op: BinOpCode, node: &Node) -> Vec<&Node> {
    match &node.kind {
        NodeKind::Binary { op: inner_op, left, right } if *inner_op == op => {
            let mut chain = flatten_chain(op, left);
            chain.push(right.as_ref());
            chain
        }
        _ => vec![node],
    }
}
