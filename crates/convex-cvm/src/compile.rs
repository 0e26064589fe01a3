//! # Compiler
//!
//! Turns source forms (cells: symbols, lists, vectors, maps, primitives)
//! into the op tree. Expansion runs first through a stackable expander
//! hook; the special forms `def, quote, if, cond, do, let, loop, fn,
//! set!, schedule, query` compile structurally, everything else becomes
//! an `Invoke`. Malformed forms raise `:COMPILE`.

use crate::context::Context;
use crate::errors::{codes, ErrorValue};
use crate::exec;
use crate::juice::costs;
use convex_types::{CoreFn, FnClause, FnTemplate, List, Op, Symbol, Value, Vector};
use std::sync::Arc;

/// An expander: returns the replacement form, or `None` to pass through.
pub type ExpanderFn = fn(&Value) -> Option<Value>;

/// A stack of expanders applied to every node before compilation.
#[derive(Clone, Default)]
pub struct ExpanderStack {
    fns: Vec<ExpanderFn>,
}

impl ExpanderStack {
    /// Pushes an expander; later entries run first.
    pub fn push(&mut self, f: ExpanderFn) {
        self.fns.push(f);
    }

    /// Expands a form at this node until no expander applies.
    #[must_use]
    pub fn expand(&self, form: &Value) -> Value {
        let mut current = form.clone();
        'outer: loop {
            for f in self.fns.iter().rev() {
                if let Some(next) = f(&current) {
                    current = next;
                    continue 'outer;
                }
            }
            return current;
        }
    }
}

fn compile_error(detail: impl Into<String>) -> ErrorValue {
    ErrorValue::new(codes::COMPILE, Value::string(&detail.into()))
}

/// Compiles a form with the default (empty) expander stack.
pub fn compile(ctx: &mut Context, form: &Value) -> Result<Op, ErrorValue> {
    compile_with(ctx, &ExpanderStack::default(), form)
}

/// Compiles a form with an explicit expander stack.
pub fn compile_with(
    ctx: &mut Context,
    expanders: &ExpanderStack,
    form: &Value,
) -> Result<Op, ErrorValue> {
    let mut frame = Vec::new();
    compile_node(ctx, expanders, &mut frame, form)
}

/// Expands, compiles and executes a form.
pub fn eval_form(ctx: &mut Context, form: &Value) {
    if !ctx.is_live() {
        return;
    }
    match compile(ctx, form) {
        Ok(op) => exec::execute(ctx, &op),
        Err(mut e) => {
            e.address = Some(ctx.address());
            ctx.raise(crate::errors::Exceptional::Error(e));
        }
    }
}

fn compile_node(
    ctx: &mut Context,
    expanders: &ExpanderStack,
    frame: &mut Vec<Symbol>,
    form: &Value,
) -> Result<Op, ErrorValue> {
    if !ctx.charge(costs::COMPILE) {
        return Err(ErrorValue::new(
            codes::JUICE,
            Value::string("juice exhausted during compile"),
        ));
    }
    let form = expanders.expand(form);
    match &form {
        Value::Symbol(sym) => Ok(compile_symbol(frame, sym)),
        Value::List(l) if !l.is_empty() => compile_list(ctx, expanders, frame, l),
        Value::Vector(v) => {
            let ops = v
                .iter()
                .map(|e| compile_node(ctx, expanders, frame, &e))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(fold_constants(ops, Value::Vector(v.clone()), CoreFn::VectorFn))
        }
        Value::Map(m) => {
            let mut ops = Vec::new();
            for (k, v) in m.entries() {
                ops.push(compile_node(ctx, expanders, frame, &k)?);
                ops.push(compile_node(ctx, expanders, frame, &v)?);
            }
            Ok(fold_constants(ops, Value::Map(m.clone()), CoreFn::HashMapFn))
        }
        Value::Set(s) => {
            let ops = s
                .members()
                .iter()
                .map(|e| compile_node(ctx, expanders, frame, e))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(fold_constants(ops, Value::Set(s.clone()), CoreFn::HashSetFn))
        }
        Value::Syntax(s) => compile_node(ctx, expanders, frame, s.value()),
        other => Ok(Op::Constant(other.clone())),
    }
}

fn compile_symbol(frame: &[Symbol], sym: &Symbol) -> Op {
    if let Some(i) = frame.iter().rposition(|s| s == sym) {
        return Op::Local(i as u32);
    }
    if let Some(sp) = convex_types::Special::from_name(sym.name()) {
        return Op::Special(sp);
    }
    Op::Lookup {
        address: None,
        symbol: sym.clone(),
    }
}

/// Constructors of literal collections fold to a constant when every
/// element is constant.
fn fold_constants(ops: Vec<Op>, literal: Value, ctor: CoreFn) -> Op {
    if ops.iter().all(|o| matches!(o, Op::Constant(_))) {
        return Op::Constant(literal);
    }
    Op::Invoke {
        func: Box::new(Op::Constant(Value::CoreFn(ctor))),
        args: ops,
    }
}

fn compile_list(
    ctx: &mut Context,
    expanders: &ExpanderStack,
    frame: &mut Vec<Symbol>,
    list: &List,
) -> Result<Op, ErrorValue> {
    let items = list.to_vec();
    let head = &items[0];
    let args = &items[1..];
    if let Value::Symbol(s) = head {
        match s.name() {
            "quote" => {
                expect_arity(args, 1, "quote")?;
                return Ok(Op::Constant(args[0].clone()));
            }
            "def" => {
                expect_arity(args, 2, "def")?;
                let Value::Symbol(sym) = &args[0] else {
                    return Err(compile_error("def requires a symbol"));
                };
                let op = compile_node(ctx, expanders, frame, &args[1])?;
                return Ok(Op::Def {
                    symbol: sym.clone(),
                    op: Box::new(op),
                });
            }
            "if" => {
                if args.len() < 2 || args.len() > 3 {
                    return Err(compile_error("if requires 2 or 3 forms"));
                }
                let test = compile_node(ctx, expanders, frame, &args[0])?;
                let then = compile_node(ctx, expanders, frame, &args[1])?;
                let fallback = match args.get(2) {
                    Some(e) => Some(Box::new(compile_node(ctx, expanders, frame, e)?)),
                    None => None,
                };
                return Ok(Op::Cond {
                    clauses: vec![(test, then)],
                    fallback,
                });
            }
            "cond" => {
                let mut clauses = Vec::new();
                let mut rest = args;
                let fallback = if rest.len() % 2 == 1 {
                    let (last, init) = rest.split_last().expect("odd length");
                    rest = init;
                    Some(Box::new(compile_node(ctx, expanders, frame, last)?))
                } else {
                    None
                };
                for pair in rest.chunks(2) {
                    let t = compile_node(ctx, expanders, frame, &pair[0])?;
                    let r = compile_node(ctx, expanders, frame, &pair[1])?;
                    clauses.push((t, r));
                }
                return Ok(Op::Cond { clauses, fallback });
            }
            "do" => {
                let ops = args
                    .iter()
                    .map(|a| compile_node(ctx, expanders, frame, a))
                    .collect::<Result<Vec<_>, _>>()?;
                return Ok(Op::Do(ops));
            }
            "let" | "loop" => {
                return compile_let(ctx, expanders, frame, args, s.name() == "loop");
            }
            "fn" => {
                return compile_fn(ctx, expanders, frame, args);
            }
            "set!" => {
                expect_arity(args, 2, "set!")?;
                let Value::Symbol(sym) = &args[0] else {
                    return Err(compile_error("set! requires a symbol"));
                };
                let Some(i) = frame.iter().rposition(|x| x == sym) else {
                    return Err(compile_error(format!("set! of unbound local {sym}")));
                };
                let op = compile_node(ctx, expanders, frame, &args[1])?;
                return Ok(Op::SetLocal {
                    index: i as u32,
                    op: Box::new(op),
                });
            }
            "schedule" => {
                expect_arity(args, 2, "schedule")?;
                let time = compile_node(ctx, expanders, frame, &args[0])?;
                // The scheduled code runs later in a fresh context with an
                // empty local frame.
                let mut fresh = Vec::new();
                let code = compile_node(ctx, expanders, &mut fresh, &args[1])?;
                return Ok(Op::Invoke {
                    func: Box::new(Op::Constant(Value::CoreFn(CoreFn::ScheduleStar))),
                    args: vec![time, Op::Constant(Value::Op(Arc::new(code)))],
                });
            }
            "query" => {
                expect_arity(args, 1, "query")?;
                let op = compile_node(ctx, expanders, frame, &args[0])?;
                return Ok(Op::Query(Box::new(op)));
            }
            _ => {}
        }
    }
    let func = compile_node(ctx, expanders, frame, head)?;
    let arg_ops = args
        .iter()
        .map(|a| compile_node(ctx, expanders, frame, a))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Op::Invoke {
        func: Box::new(func),
        args: arg_ops,
    })
}

fn expect_arity(args: &[Value], n: usize, what: &str) -> Result<(), ErrorValue> {
    if args.len() == n {
        Ok(())
    } else {
        Err(compile_error(format!("{what} requires {n} form(s)")))
    }
}

fn compile_let(
    ctx: &mut Context,
    expanders: &ExpanderStack,
    frame: &mut Vec<Symbol>,
    args: &[Value],
    loop_form: bool,
) -> Result<Op, ErrorValue> {
    let Some(Value::Vector(binding_vec)) = args.first() else {
        return Err(compile_error("let requires a binding vector"));
    };
    let pairs = binding_vec.to_vec();
    if pairs.len() % 2 != 0 {
        return Err(compile_error("let bindings must pair symbols with forms"));
    }
    let base = frame.len();
    let mut bindings = Vec::with_capacity(pairs.len() / 2);
    for pair in pairs.chunks(2) {
        let Value::Symbol(sym) = &pair[0] else {
            frame.truncate(base);
            return Err(compile_error("let binding name must be a symbol"));
        };
        let op = match compile_node(ctx, expanders, frame, &pair[1]) {
            Ok(op) => op,
            Err(e) => {
                frame.truncate(base);
                return Err(e);
            }
        };
        frame.push(sym.clone());
        bindings.push((sym.clone(), op));
    }
    let body = args[1..]
        .iter()
        .map(|a| compile_node(ctx, expanders, frame, a))
        .collect::<Result<Vec<_>, _>>();
    frame.truncate(base);
    Ok(Op::Let {
        bindings,
        body: body?,
        loop_form,
    })
}

/// Parses a parameter vector: plain symbols with an optional trailing
/// `& rest`.
fn parse_params(params: &Vector) -> Result<(Vec<Symbol>, bool), ErrorValue> {
    let items = params.to_vec();
    let mut out = Vec::with_capacity(items.len());
    let mut variadic = false;
    let mut i = 0;
    while i < items.len() {
        let Value::Symbol(sym) = &items[i] else {
            return Err(compile_error("parameter must be a symbol"));
        };
        if sym.name() == "&" {
            let Some(Value::Symbol(rest)) = items.get(i + 1) else {
                return Err(compile_error("& must be followed by a rest parameter"));
            };
            if i + 2 != items.len() {
                return Err(compile_error("rest parameter must be last"));
            }
            out.push(rest.clone());
            variadic = true;
            break;
        }
        out.push(sym.clone());
        i += 1;
    }
    Ok((out, variadic))
}

fn compile_fn(
    ctx: &mut Context,
    expanders: &ExpanderStack,
    frame: &mut Vec<Symbol>,
    args: &[Value],
) -> Result<Op, ErrorValue> {
    if args.is_empty() {
        return Err(compile_error("fn requires parameters"));
    }
    let clause_forms: Vec<(Vector, Vec<Value>)> = match &args[0] {
        // Single-arity: (fn [params] body...)
        Value::Vector(params) => vec![(params.clone(), args[1..].to_vec())],
        // Multi-arity: (fn ([params] body...) ([params] body...))
        Value::List(_) => args
            .iter()
            .map(|clause| match clause {
                Value::List(l) => {
                    let items = l.to_vec();
                    match items.first() {
                        Some(Value::Vector(params)) => {
                            Ok((params.clone(), items[1..].to_vec()))
                        }
                        _ => Err(compile_error("fn clause requires a parameter vector")),
                    }
                }
                _ => Err(compile_error("fn clause must be a list")),
            })
            .collect::<Result<Vec<_>, _>>()?,
        _ => return Err(compile_error("fn requires a parameter vector")),
    };

    let mut clauses = Vec::with_capacity(clause_forms.len());
    for (params, body_forms) in clause_forms {
        let (names, variadic) = parse_params(&params)?;
        let base = frame.len();
        frame.extend(names.iter().cloned());
        let body = body_forms
            .iter()
            .map(|b| compile_node(ctx, expanders, frame, b))
            .collect::<Result<Vec<_>, _>>();
        frame.truncate(base);
        let mut body = body?;
        let body = if body.len() == 1 {
            body.remove(0)
        } else {
            Op::Do(body)
        };
        clauses.push(FnClause {
            params: names,
            variadic,
            body,
        });
    }
    Ok(Op::Lambda(Arc::new(FnTemplate { clauses })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use convex_types::{Address, BlobMap, Globals, State};

    fn ctx() -> Context {
        let globals = Globals {
            timestamp: 0,
            fees: 0,
            juice_price: 2,
            pool_memory: 1_000_000,
            pool_value: 1_000_000,
            protocol: Value::Nil,
        };
        let state = State::new(
            Vector::empty(),
            BlobMap::empty(),
            globals,
            BlobMap::empty(),
        );
        Context::new(state, Address::new(0), 1_000_000)
    }

    fn list(items: Vec<Value>) -> Value {
        Value::List(List::from_values(items))
    }

    #[test]
    fn test_constant_compile() {
        let mut c = ctx();
        assert_eq!(
            compile(&mut c, &Value::Long(1)).unwrap(),
            Op::Constant(Value::Long(1))
        );
        assert_eq!(
            compile(&mut c, &Value::keyword("k")).unwrap(),
            Op::Constant(Value::keyword("k"))
        );
    }

    #[test]
    fn test_symbol_becomes_lookup_or_special() {
        let mut c = ctx();
        assert!(matches!(
            compile(&mut c, &Value::symbol("foo")).unwrap(),
            Op::Lookup { .. }
        ));
        assert!(matches!(
            compile(&mut c, &Value::symbol("*address*")).unwrap(),
            Op::Special(convex_types::Special::Address)
        ));
    }

    #[test]
    fn test_let_binds_locals() {
        let mut c = ctx();
        let form = list(vec![
            Value::symbol("let"),
            Value::Vector(Vector::from_values(vec![
                Value::symbol("x"),
                Value::Long(1),
            ])),
            Value::symbol("x"),
        ]);
        let op = compile(&mut c, &form).unwrap();
        let Op::Let { bindings, body, loop_form } = op else {
            panic!("expected let");
        };
        assert!(!loop_form);
        assert_eq!(bindings.len(), 1);
        assert_eq!(body, vec![Op::Local(0)]);
    }

    #[test]
    fn test_fn_variadic_params() {
        let mut c = ctx();
        let form = list(vec![
            Value::symbol("fn"),
            Value::Vector(Vector::from_values(vec![
                Value::symbol("a"),
                Value::symbol("&"),
                Value::symbol("rest"),
            ])),
            Value::symbol("rest"),
        ]);
        let op = compile(&mut c, &form).unwrap();
        let Op::Lambda(template) = op else {
            panic!("expected lambda");
        };
        assert_eq!(template.clauses.len(), 1);
        assert!(template.clauses[0].variadic);
        assert_eq!(template.clauses[0].params.len(), 2);
    }

    #[test]
    fn test_vector_literal_folds() {
        let mut c = ctx();
        let form = Value::Vector(Vector::from_values(vec![Value::Long(1), Value::Long(2)]));
        assert_eq!(compile(&mut c, &form).unwrap(), Op::Constant(form));
    }

    #[test]
    fn test_malformed_def_fails() {
        let mut c = ctx();
        let form = list(vec![Value::symbol("def"), Value::Long(1), Value::Long(2)]);
        let err = compile(&mut c, &form).unwrap_err();
        assert!(err.is_code(codes::COMPILE));
    }

    #[test]
    fn test_expander_hook() {
        let mut c = ctx();
        let mut stack = ExpanderStack::default();
        // Replace the keyword :marker with the long 42 everywhere.
        stack.push(|form| {
            if *form == Value::keyword("marker") {
                Some(Value::Long(42))
            } else {
                None
            }
        });
        let op = compile_with(&mut c, &stack, &Value::keyword("marker")).unwrap();
        assert_eq!(op, Op::Constant(Value::Long(42)));
    }
}
