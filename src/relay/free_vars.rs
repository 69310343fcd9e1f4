use std::collections::HashSet;

use crate::relay::expr::{Expr, Function, Var, VarId};

/// Variables referenced by `expr` but not bound inside it, in order of first
/// occurrence. A `let` binds its variable in its own value as well as in its
/// body, so a let-bound recursive function does not list itself.
pub fn free_vars(expr: &Expr) -> Vec<Var> {
    let mut bound: Vec<VarId> = Vec::new();
    let mut seen: HashSet<VarId> = HashSet::new();
    let mut out = Vec::new();
    collect(expr, &mut bound, &mut seen, &mut out);
    out
}

/// Free variables of a function literal: those its body uses beyond its parameters.
pub fn function_free_vars(func: &Function) -> Vec<Var> {
    let mut bound: Vec<VarId> = func.params.iter().map(Var::id).collect();
    let mut seen: HashSet<VarId> = HashSet::new();
    let mut out = Vec::new();
    collect(&func.body, &mut bound, &mut seen, &mut out);
    out
}

fn collect(expr: &Expr, bound: &mut Vec<VarId>, seen: &mut HashSet<VarId>, out: &mut Vec<Var>) {
    match expr {
        Expr::Var(v) => {
            if !bound.contains(&v.id()) && seen.insert(v.id()) {
                out.push(v.clone());
            }
        }
        Expr::Constant(_) | Expr::Global(_) | Expr::Op(_) => {}
        Expr::Let { var, value, body } => {
            bound.push(var.id());
            collect(value, bound, seen, out);
            collect(body, bound, seen, out);
            bound.pop();
        }
        Expr::Function(f) => {
            let mark = bound.len();
            bound.extend(f.params.iter().map(Var::id));
            collect(&f.body, bound, seen, out);
            bound.truncate(mark);
        }
        Expr::Call { callee, args, .. } => {
            collect(callee, bound, seen, out);
            for a in args {
                collect(a, bound, seen, out);
            }
        }
        Expr::If {
            cond,
            then_branch,
            else_branch,
            ..
        } => {
            collect(cond, bound, seen, out);
            collect(then_branch, bound, seen, out);
            collect(else_branch, bound, seen, out);
        }
        Expr::Tuple { fields, .. } | Expr::Construct { fields, .. } => {
            for f in fields {
                collect(f, bound, seen, out);
            }
        }
        Expr::Match { data, clauses, .. } => {
            collect(data, bound, seen, out);
            for clause in clauses {
                let mark = bound.len();
                bound.extend(clause.pattern.bound_vars().into_iter().map(Var::id));
                collect(&clause.body, bound, seen, out);
                bound.truncate(mark);
            }
        }
    }
}
