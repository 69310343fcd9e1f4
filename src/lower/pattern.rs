//! Match lowering and static exhaustiveness.
//!
//! Exhaustiveness follows the usual usefulness algorithm over a pattern
//! matrix: a column whose head constructors cover the whole signature is
//! specialized per constructor, anything else falls back to the default
//! matrix. The search returns a witness, a value shape no clause accepts.

use std::collections::HashSet;
use std::fmt;

use tracing::warn;

use crate::error::LowerError;
use crate::ir::node::{CppMatch, MatchClause, Node, Pattern};
use crate::ir::types::Type;
use crate::lower::expr::{Binding, FnLowerer};
use crate::relay::{self, Clause, Expr, Module};

impl<'c, 'm> FnLowerer<'c, 'm> {
    pub(super) fn lower_match(&mut self, expr: &Expr, data: &Expr, clauses: &[Clause]) -> Result<Node, LowerError> {
        let data_node = self.lower_expr(data)?;
        let scrutinee_ty = self.type_of(data);

        let declared = expr.ty();
        let mut result_ty = declared.is_resolved().then_some(declared);
        let mut lowered = Vec::with_capacity(clauses.len());
        for clause in clauses {
            let saved = self.env.clone();
            let pattern = self.lower_pattern(&clause.pattern, scrutinee_ty.as_ref())?;
            let body = self.lower_scope(&clause.body)?;
            if result_ty.is_none() {
                result_ty = self.type_of(&clause.body);
            }
            self.env = saved;
            lowered.push(MatchClause { pattern, body });
        }

        if self.cx.options.check_exhaustiveness {
            match &scrutinee_ty {
                Some(ty) => {
                    let patterns: Vec<&Pattern> = lowered.iter().map(|c| &c.pattern).collect();
                    if let Some(witness) = missing_pattern(self.cx.module, &patterns, ty) {
                        return Err(LowerError::NonExhaustiveMatch {
                            func: self.func_name.clone(),
                            ty: ty.to_string(),
                            missing: witness.to_string(),
                        });
                    }
                }
                None => warn!(
                    function = %self.func_name,
                    "match scrutinee has no resolved type; coverage is checked at run time"
                ),
            }
        }

        let ty = result_ty.ok_or_else(|| LowerError::UnresolvedType {
            func: self.func_name.clone(),
            construct: "match",
        })?;
        CppMatch::new(data_node, lowered, ty)
            .map(Node::Match)
            .map_err(|e| self.invalid(e))
    }

    /// Lowers a source pattern against the type it will be matched with,
    /// binding each pattern variable to a fresh name in the environment.
    fn lower_pattern(&mut self, pat: &relay::Pattern, ty: Option<&Type>) -> Result<Pattern, LowerError> {
        let ty = ty.filter(|t| t.is_resolved());
        match pat {
            relay::Pattern::Wildcard => Ok(Pattern::Wildcard),
            relay::Pattern::Var(v) => {
                let ident = self.fresh(v.name());
                let bound_ty = if v.ty().is_resolved() {
                    v.ty().clone()
                } else {
                    ty.cloned().unwrap_or(Type::Infer)
                };
                self.env.insert(
                    v.id(),
                    Binding {
                        ident: ident.clone(),
                        ty: bound_ty,
                    },
                );
                Ok(Pattern::Bind(ident))
            }
            relay::Pattern::Constructor { name, fields } => {
                let module = self.cx.module;
                let info = module
                    .constructor(name)
                    .ok_or_else(|| LowerError::UnknownConstructor {
                        func: self.func_name.clone(),
                        name: name.clone(),
                    })?;
                match ty {
                    Some(Type::Adt(adt)) if *adt == info.adt.name => {}
                    None => {}
                    Some(other) => {
                        return Err(self.mismatch(
                            "match pattern",
                            format!(
                                "constructor '{}' belongs to '{}', but the scrutinee has type '{}'",
                                name, info.adt.name, other
                            ),
                        ))
                    }
                }
                self.check_arity(format!("constructor pattern '{}'", name), info.def.fields.len(), fields.len())?;
                let mut sub = Vec::with_capacity(fields.len());
                for (p, field_ty) in fields.iter().zip(&info.def.fields) {
                    sub.push(self.lower_pattern(p, Some(field_ty))?);
                }
                Ok(Pattern::Constructor {
                    tag: info.tag,
                    name: name.clone(),
                    fields: sub,
                })
            }
            relay::Pattern::Tuple(items) => {
                let field_tys = match ty {
                    Some(Type::Tuple(tys)) => {
                        self.check_arity("tuple pattern".to_owned(), tys.len(), items.len())?;
                        Some(tys.as_slice())
                    }
                    None => None,
                    Some(other) => {
                        return Err(self.mismatch(
                            "match pattern",
                            format!("tuple pattern used on a value of type '{}'", other),
                        ))
                    }
                };
                let mut sub = Vec::with_capacity(items.len());
                for (i, p) in items.iter().enumerate() {
                    sub.push(self.lower_pattern(p, field_tys.and_then(|t| t.get(i)))?);
                }
                Ok(Pattern::Tuple(sub))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Exhaustiveness
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Pat {
    Wild,
    /// Tuples are the single constructor (tag 0) of their type.
    Ctor { tag: usize, fields: Vec<Pat> },
}

impl Pat {
    fn from_pattern(p: &Pattern) -> Self {
        match p {
            Pattern::Wildcard | Pattern::Bind(_) => Pat::Wild,
            Pattern::Constructor { tag, fields, .. } => Pat::Ctor {
                tag: *tag,
                fields: fields.iter().map(Pat::from_pattern).collect(),
            },
            Pattern::Tuple(fields) => Pat::Ctor {
                tag: 0,
                fields: fields.iter().map(Pat::from_pattern).collect(),
            },
        }
    }

    fn is_wild(&self) -> bool {
        matches!(self, Pat::Wild)
    }
}

/// A value shape that no clause matches.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Witness {
    Wild,
    Ctor { name: String, fields: Vec<Witness> },
    Tuple(Vec<Witness>),
}

impl fmt::Display for Witness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, items: &[Witness]) -> fmt::Result {
            write!(f, "(")?;
            for (i, w) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", w)?;
            }
            write!(f, ")")
        }
        match self {
            Witness::Wild => write!(f, "_"),
            Witness::Ctor { name, fields } => {
                write!(f, "{}", name)?;
                if fields.is_empty() {
                    Ok(())
                } else {
                    list(f, fields)
                }
            }
            Witness::Tuple(fields) => list(f, fields),
        }
    }
}

/// Constructors of a type with a finite signature.
struct CtorSet {
    tuple: bool,
    ctors: Vec<(String, Vec<Type>)>,
}

impl CtorSet {
    fn of(module: &Module, ty: &Type) -> Option<Self> {
        match ty {
            Type::Adt(name) => module.type_data(name).map(|td| CtorSet {
                tuple: false,
                ctors: td
                    .constructors
                    .iter()
                    .map(|c| (c.name.clone(), c.fields.clone()))
                    .collect(),
            }),
            Type::Tuple(tys) => Some(CtorSet {
                tuple: true,
                ctors: vec![(String::new(), tys.clone())],
            }),
            _ => None,
        }
    }

    fn witness(&self, tag: usize, fields: Vec<Witness>) -> Witness {
        if self.tuple {
            Witness::Tuple(fields)
        } else {
            let name = self.ctors.get(tag).map(|(n, _)| n.clone()).unwrap_or_default();
            Witness::Ctor { name, fields }
        }
    }
}

/// Returns a value of type `ty` that none of `patterns` accepts, if any.
pub(crate) fn missing_pattern(module: &Module, patterns: &[&Pattern], ty: &Type) -> Option<Witness> {
    let rows: Vec<Vec<Pat>> = patterns.iter().map(|p| vec![Pat::from_pattern(p)]).collect();
    find_missing(module, &rows, std::slice::from_ref(ty)).and_then(|mut w| w.pop())
}

fn find_missing(module: &Module, rows: &[Vec<Pat>], tys: &[Type]) -> Option<Vec<Witness>> {
    if rows.is_empty() {
        return Some(vec![Witness::Wild; tys.len()]);
    }
    if rows.iter().any(|r| r.iter().all(Pat::is_wild)) {
        return None;
    }
    let (head_ty, rest_tys) = tys.split_first()?;
    let set = CtorSet::of(module, head_ty);
    let heads: HashSet<usize> = rows
        .iter()
        .filter_map(|r| match r.first() {
            Some(Pat::Ctor { tag, .. }) => Some(*tag),
            _ => None,
        })
        .collect();

    if let Some(set) = set.as_ref().filter(|s| (0..s.ctors.len()).all(|t| heads.contains(&t))) {
        for (tag, (_, field_tys)) in set.ctors.iter().enumerate() {
            let arity = field_tys.len();
            let specialized: Vec<Vec<Pat>> = rows.iter().filter_map(|r| specialize(r, tag, arity)).collect();
            let mut sub_tys = field_tys.clone();
            sub_tys.extend_from_slice(rest_tys);
            if let Some(mut w) = find_missing(module, &specialized, &sub_tys) {
                let rest = w.split_off(arity);
                let mut out = vec![set.witness(tag, w)];
                out.extend(rest);
                return Some(out);
            }
        }
        return None;
    }

    let default: Vec<Vec<Pat>> = rows
        .iter()
        .filter(|r| r.first().is_some_and(Pat::is_wild))
        .map(|r| r[1..].to_vec())
        .collect();
    let mut w = find_missing(module, &default, rest_tys)?;
    let head = match &set {
        Some(set) => match (0..set.ctors.len()).find(|t| !heads.contains(t)) {
            Some(tag) => set.witness(tag, vec![Witness::Wild; set.ctors[tag].1.len()]),
            None => Witness::Wild,
        },
        None => Witness::Wild,
    };
    w.insert(0, head);
    Some(w)
}

fn specialize(row: &[Pat], tag: usize, arity: usize) -> Option<Vec<Pat>> {
    let (head, rest) = row.split_first()?;
    let mut out = match head {
        Pat::Wild => vec![Pat::Wild; arity],
        Pat::Ctor { tag: t, fields } if *t == tag => fields.clone(),
        Pat::Ctor { .. } => return None,
    };
    out.extend_from_slice(rest);
    Some(out)
}
