//! Low-level AST pretty-printer.
//!
//! Emits a human-readable text representation of a lowered `Program`.
//! Output is deterministic: functions are printed in `FunctionId` order,
//! bindings in evaluation order, match clauses in source order.

use std::fmt::Write;

use crate::error::CodegenError;
use crate::ir::node::{Callee, CppFunction, Node, Param, Pattern};
use crate::ir::program::Program;

/// Emits a full text dump of the lowered program.
pub fn emit_program_text(program: &Program) -> Result<String, CodegenError> {
    let mut out = String::new();
    writeln!(out, "// aotc lowered program: {} function(s)", program.len())?;

    for (id, name, func) in program.functions() {
        write!(out, "\ndef {} {}(", id, name)?;
        emit_params(&mut out, func.params())?;
        write!(out, ") -> {} {{", func.ret_type())?;
        newline(&mut out, 1);
        emit_node(&mut out, func.body(), 1)?;
        writeln!(out, "\n}}")?;
    }
    Ok(out)
}

/// Emits a single node, as it would appear inside a function body.
pub fn emit_node_text(node: &Node) -> Result<String, CodegenError> {
    let mut out = String::new();
    emit_node(&mut out, node, 0)?;
    Ok(out)
}

fn newline(out: &mut String, depth: usize) {
    out.push('\n');
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn emit_params(out: &mut String, params: &[Param]) -> Result<(), CodegenError> {
    for (i, p) in params.iter().enumerate() {
        if i > 0 {
            write!(out, ", ")?;
        }
        write!(out, "{}: {}", p.name, p.ty)?;
    }
    Ok(())
}

fn emit_list(out: &mut String, nodes: &[Node], depth: usize) -> Result<(), CodegenError> {
    write!(out, "(")?;
    for (i, n) in nodes.iter().enumerate() {
        if i > 0 {
            write!(out, ", ")?;
        }
        emit_node(out, n, depth)?;
    }
    write!(out, ")")?;
    Ok(())
}

fn emit_function(out: &mut String, func: &CppFunction, depth: usize) -> Result<(), CodegenError> {
    write!(out, "fn")?;
    if let Some(name) = func.name() {
        write!(out, " {}", name)?;
    }
    write!(out, "(")?;
    emit_params(out, func.params())?;
    write!(out, ")")?;
    if !func.captures().is_empty() {
        write!(out, " captures [")?;
        emit_params(out, func.captures())?;
        write!(out, "]")?;
    }
    write!(out, " -> {} {{", func.ret_type())?;
    newline(out, depth + 1);
    emit_node(out, func.body(), depth + 1)?;
    newline(out, depth);
    write!(out, "}}")?;
    Ok(())
}

fn emit_node(out: &mut String, node: &Node, depth: usize) -> Result<(), CodegenError> {
    match node {
        Node::Var(name) => write!(out, "{}", name)?,

        Node::Literal(t) => write!(out, "const({})", t)?,

        Node::Global(g) => write!(out, "@{}", g.name)?,

        Node::Decl(decl) => {
            for (name, bound) in decl.bindings() {
                write!(out, "let {} = ", name)?;
                emit_node(out, bound, depth)?;
                newline(out, depth);
            }
            emit_node(out, decl.body(), depth)?;
        }

        Node::PackedCall(call) => {
            write!(out, "packed {}/{}", call.name(), call.arity())?;
            if call.args_is_tuple() {
                write!(out, " tuple")?;
            }
            emit_list(out, call.args(), depth)?;
            write!(out, " : {}", call.output_type())?;
        }

        Node::Invoke(inv) => {
            write!(out, "invoke ")?;
            match inv.callee() {
                Callee::Global(g) => write!(out, "@{}", g.name)?,
                Callee::Value(f) => emit_node(out, f, depth)?,
            }
            emit_list(out, inv.args(), depth)?;
        }

        Node::Function(func) => emit_function(out, func, depth)?,

        Node::If(cif) => {
            write!(out, "if ")?;
            emit_node(out, cif.cond(), depth)?;
            write!(out, " {{")?;
            newline(out, depth + 1);
            emit_node(out, cif.true_branch(), depth + 1)?;
            newline(out, depth);
            write!(out, "}} else {{")?;
            newline(out, depth + 1);
            emit_node(out, cif.false_branch(), depth + 1)?;
            newline(out, depth);
            write!(out, "}} : {}", cif.ty())?;
        }

        Node::Tuple(t) => emit_list(out, t.fields(), depth)?,

        Node::Match(m) => {
            write!(out, "match ")?;
            emit_node(out, m.data(), depth)?;
            write!(out, " {{")?;
            for clause in m.clauses() {
                newline(out, depth + 1);
                emit_pattern(out, &clause.pattern)?;
                write!(out, " =>")?;
                newline(out, depth + 2);
                emit_node(out, &clause.body, depth + 2)?;
            }
            newline(out, depth);
            write!(out, "}} : {}", m.ty())?;
        }

        Node::Constructor(c) => {
            write!(out, "{}#{}", c.name(), c.tag())?;
            if !c.fields().is_empty() {
                emit_list(out, c.fields(), depth)?;
            }
        }
    }
    Ok(())
}

fn emit_pattern(out: &mut String, pattern: &Pattern) -> Result<(), CodegenError> {
    match pattern {
        Pattern::Wildcard => write!(out, "_")?,
        Pattern::Bind(name) => write!(out, "{}", name)?,
        Pattern::Constructor { tag, name, fields } => {
            write!(out, "{}#{}", name, tag)?;
            if !fields.is_empty() {
                emit_pattern_list(out, fields)?;
            }
        }
        Pattern::Tuple(fields) => emit_pattern_list(out, fields)?,
    }
    Ok(())
}

fn emit_pattern_list(out: &mut String, fields: &[Pattern]) -> Result<(), CodegenError> {
    write!(out, "(")?;
    for (i, p) in fields.iter().enumerate() {
        if i > 0 {
            write!(out, ", ")?;
        }
        emit_pattern(out, p)?;
    }
    write!(out, ")")?;
    Ok(())
}
