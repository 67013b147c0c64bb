// GROQ in-memory evaluator.
//
// Evaluates a parsed expression against a dataset of JSON documents. Arrays
// auto-map for attribute access, dereferencing and projection, so
// `savedListings[]->{ title }` yields one projected object per reference.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::ast::{Expr, OrderTerm, ProjectionField};
use crate::functions::call_builtin;

#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("type error: {0}")]
    TypeError(String),
    #[error("parameter ${0} was not provided")]
    MissingParam(String),
}

/// The documents a query runs against, indexed by `_id` for dereferencing.
#[derive(Debug, Default, Clone)]
pub struct Dataset {
    docs: Vec<Value>,
    by_id: HashMap<String, usize>,
}

impl Dataset {
    pub fn new(docs: Vec<Value>) -> Self {
        let by_id = docs
            .iter()
            .enumerate()
            .filter_map(|(i, doc)| Some((doc.get("_id")?.as_str()?.to_string(), i)))
            .collect();
        Self { docs, by_id }
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.by_id.get(id).map(|&i| &self.docs[i])
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

/// Lexical scope: `@` is `this`, `^` walks to `parent`.
#[derive(Clone, Copy)]
struct Scope<'s> {
    this: &'s Value,
    parent: Option<&'s Scope<'s>>,
}

struct Evaluator<'a> {
    dataset: &'a Dataset,
    params: &'a Value,
}

/// Evaluate `expr` against `dataset` with the given `$params` object.
pub fn evaluate(expr: &Expr, dataset: &Dataset, params: &Value) -> Result<Value, EvalError> {
    let root = Value::Null;
    let evaluator = Evaluator { dataset, params };
    evaluator.eval(
        expr,
        Scope {
            this: &root,
            parent: None,
        },
    )
}

/// Evaluate a predicate against a single document; anything but `true` is a miss.
pub fn eval_filter(expr: &Expr, doc: &Value, params: &Value) -> Result<bool, EvalError> {
    let dataset = Dataset::default();
    let evaluator = Evaluator {
        dataset: &dataset,
        params,
    };
    let v = evaluator.eval(
        expr,
        Scope {
            this: doc,
            parent: None,
        },
    )?;
    Ok(v == Value::Bool(true))
}

impl<'a> Evaluator<'a> {
    fn eval(&self, expr: &Expr, scope: Scope<'_>) -> Result<Value, EvalError> {
        match expr {
            Expr::StringLiteral(s) => Ok(Value::String(s.clone())),
            Expr::IntLiteral(n) => Ok(Value::from(*n)),
            Expr::FloatLiteral(n) => Ok(Value::from(*n)),
            Expr::BoolLiteral(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Array(items) => items
                .iter()
                .map(|item| self.eval(item, scope))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),

            Expr::Ident(name) => Ok(attribute(scope.this, name)),
            Expr::DotAccess(base, field) => Ok(attribute(&self.eval(base, scope)?, field)),
            Expr::Deref(base) => Ok(self.deref(&self.eval(base, scope)?)),
            Expr::This => Ok(scope.this.clone()),
            Expr::Parent => Ok(scope.parent.map(|p| p.this.clone()).unwrap_or(Value::Null)),
            Expr::Param(name) => self
                .params
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::MissingParam(name.clone())),

            Expr::Eq(l, r) => {
                let (l, r) = (self.eval(l, scope)?, self.eval(r, scope)?);
                Ok(Value::Bool(values_equal(&l, &r)))
            }
            Expr::Neq(l, r) => {
                let (l, r) = (self.eval(l, scope)?, self.eval(r, scope)?);
                Ok(Value::Bool(!values_equal(&l, &r)))
            }
            Expr::Lt(l, r) => self.ordering(l, r, scope, |o| o == Ordering::Less),
            Expr::Gt(l, r) => self.ordering(l, r, scope, |o| o == Ordering::Greater),
            Expr::Lte(l, r) => self.ordering(l, r, scope, |o| o != Ordering::Greater),
            Expr::Gte(l, r) => self.ordering(l, r, scope, |o| o != Ordering::Less),
            Expr::In(l, r) => {
                let needle = self.eval(l, scope)?;
                match self.eval(r, scope)? {
                    Value::Array(items) => {
                        Ok(Value::Bool(items.iter().any(|v| values_equal(v, &needle))))
                    }
                    _ => Ok(Value::Null),
                }
            }

            Expr::And(l, r) => {
                let l = self.eval(l, scope)?;
                if l == Value::Bool(false) {
                    return Ok(l);
                }
                match (l, self.eval(r, scope)?) {
                    (_, Value::Bool(false)) => Ok(Value::Bool(false)),
                    (Value::Bool(true), Value::Bool(true)) => Ok(Value::Bool(true)),
                    _ => Ok(Value::Null),
                }
            }
            Expr::Or(l, r) => {
                let l = self.eval(l, scope)?;
                if l == Value::Bool(true) {
                    return Ok(l);
                }
                match (l, self.eval(r, scope)?) {
                    (_, Value::Bool(true)) => Ok(Value::Bool(true)),
                    (Value::Bool(false), Value::Bool(false)) => Ok(Value::Bool(false)),
                    _ => Ok(Value::Null),
                }
            }
            Expr::Not(inner) => match self.eval(inner, scope)? {
                Value::Bool(b) => Ok(Value::Bool(!b)),
                _ => Ok(Value::Null),
            },

            Expr::Everything => Ok(Value::Array(self.dataset.docs.clone())),
            Expr::Filter(base, predicate) => match self.eval(base, scope)? {
                Value::Array(items) => {
                    let mut kept = Vec::new();
                    for item in items {
                        let child = Scope {
                            this: &item,
                            parent: Some(&scope),
                        };
                        if self.eval(predicate, child)? == Value::Bool(true) {
                            kept.push(item);
                        }
                    }
                    Ok(Value::Array(kept))
                }
                _ => Ok(Value::Null),
            },
            Expr::Element(base, index) => match self.eval(base, scope)? {
                Value::Array(mut items) => {
                    let len = items.len() as i64;
                    let i = if *index < 0 { len + index } else { *index };
                    if (0..len).contains(&i) {
                        Ok(items.swap_remove(i as usize))
                    } else {
                        Ok(Value::Null)
                    }
                }
                _ => Ok(Value::Null),
            },
            Expr::Slice {
                base,
                start,
                end,
                inclusive,
            } => {
                let Value::Array(items) = self.eval(base, scope)? else {
                    return Ok(Value::Null);
                };
                let start = self.eval_index(start, scope)?;
                let end = self.eval_index(end, scope)?;
                let len = items.len() as i64;
                let clamp = |i: i64| if i < 0 { (len + i).max(0) } else { i.min(len) };
                let from = clamp(start);
                let mut to = clamp(end);
                if *inclusive {
                    to = (to + 1).min(len);
                }
                if from >= to {
                    return Ok(Value::Array(Vec::new()));
                }
                Ok(Value::Array(
                    items
                        .into_iter()
                        .skip(from as usize)
                        .take((to - from) as usize)
                        .collect(),
                ))
            }
            Expr::Traverse(base) => match self.eval(base, scope)? {
                v @ Value::Array(_) => Ok(v),
                _ => Ok(Value::Null),
            },
            Expr::Projection(base, fields) => {
                let v = match (base.as_ref(), self.eval(base, scope)?) {
                    // A bare `{...}` at the root builds an object.
                    (Expr::This, Value::Null) => Value::Object(Map::new()),
                    (_, v) => v,
                };
                self.project(v, fields, scope)
            }
            Expr::Order(base, terms) => match self.eval(base, scope)? {
                Value::Array(items) => self.order(items, terms, scope).map(Value::Array),
                _ => Ok(Value::Null),
            },

            Expr::FuncCall(name, args) => {
                let args = args
                    .iter()
                    .map(|a| self.eval(a, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                call_builtin(name, &args, scope.this)
            }
        }
    }

    fn ordering(
        &self,
        l: &Expr,
        r: &Expr,
        scope: Scope<'_>,
        test: impl Fn(Ordering) -> bool,
    ) -> Result<Value, EvalError> {
        let (l, r) = (self.eval(l, scope)?, self.eval(r, scope)?);
        Ok(compare(&l, &r)
            .map(|o| Value::Bool(test(o)))
            .unwrap_or(Value::Null))
    }

    fn eval_index(&self, expr: &Expr, scope: Scope<'_>) -> Result<i64, EvalError> {
        match self.eval(expr, scope)? {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .ok_or_else(|| EvalError::TypeError("slice bound out of range".into())),
            other => Err(EvalError::TypeError(format!(
                "slice bounds must be numbers, got {other}"
            ))),
        }
    }

    fn deref(&self, v: &Value) -> Value {
        match v {
            Value::Array(items) => Value::Array(items.iter().map(|i| self.deref(i)).collect()),
            Value::Object(map) => map
                .get("_ref")
                .and_then(Value::as_str)
                .and_then(|id| self.dataset.get(id))
                .cloned()
                .unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    fn project(
        &self,
        v: Value,
        fields: &[ProjectionField],
        scope: Scope<'_>,
    ) -> Result<Value, EvalError> {
        match v {
            Value::Array(items) => items
                .into_iter()
                .map(|item| self.project(item, fields, scope))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(ref source) => {
                let mut out = Map::new();
                let child = Scope {
                    this: &v,
                    parent: Some(&scope),
                };
                for field in fields {
                    match field {
                        ProjectionField::Spread => {
                            out.extend(source.iter().map(|(k, v)| (k.clone(), v.clone())));
                        }
                        ProjectionField::Named(name, expr) => {
                            let value = self.eval(expr, child)?;
                            if value.is_null() {
                                out.remove(name);
                            } else {
                                out.insert(name.clone(), value);
                            }
                        }
                    }
                }
                Ok(Value::Object(out))
            }
            _ => Ok(Value::Null),
        }
    }

    fn order(
        &self,
        items: Vec<Value>,
        terms: &[OrderTerm],
        scope: Scope<'_>,
    ) -> Result<Vec<Value>, EvalError> {
        let mut keyed = Vec::with_capacity(items.len());
        for item in items {
            let child = Scope {
                this: &item,
                parent: Some(&scope),
            };
            let keys = terms
                .iter()
                .map(|t| self.eval(&t.expr, child))
                .collect::<Result<Vec<_>, _>>()?;
            keyed.push((keys, item));
        }
        keyed.sort_by(|(a, _), (b, _)| {
            terms
                .iter()
                .zip(a.iter().zip(b.iter()))
                .map(|(term, (x, y))| {
                    let o = sort_cmp(x, y);
                    if term.ascending {
                        o
                    } else {
                        o.reverse()
                    }
                })
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
        Ok(keyed.into_iter().map(|(_, item)| item).collect())
    }
}

fn attribute(v: &Value, name: &str) -> Value {
    match v {
        Value::Object(map) => map.get(name).cloned().unwrap_or(Value::Null),
        Value::Array(items) => Value::Array(items.iter().map(|i| attribute(i, name)).collect()),
        _ => Value::Null,
    }
}

/// Equality with numeric coercion, so `1 == 1.0`.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Ordering between comparable values; `None` for mixed or non-scalar types.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Sort order used by `order()`: nulls sort after every other value.
fn sort_cmp(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        _ => compare(a, b).unwrap_or(Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use serde_json::json;

    fn dataset() -> Dataset {
        Dataset::new(vec![
            json!({"_id": "agent-u1", "_type": "agent", "userId": "u1", "name": "Ada", "onboardingComplete": true}),
            json!({"_id": "p1", "_type": "property", "title": "Loft", "price": 300000, "status": "active",
                   "agent": {"_type": "reference", "_ref": "agent-u1"}, "createdAt": "2024-01-02"}),
            json!({"_id": "p2", "_type": "property", "title": "Cottage", "price": 150000.0, "status": "sold",
                   "agent": {"_type": "reference", "_ref": "agent-u1"}, "createdAt": "2024-03-01"}),
            json!({"_id": "l1", "_type": "lead", "property": {"_ref": "p1"}, "status": "new"}),
            json!({"_id": "l2", "_type": "lead", "property": {"_ref": "p1"}, "status": "closed"}),
            json!({"_id": "buyer", "_type": "user", "clerkId": "u9",
                   "savedListings": [{"_key": "a", "_ref": "p2"}, {"_key": "b", "_ref": "p1"}]}),
        ])
    }

    fn run(src: &str, params: Value) -> Value {
        evaluate(&parse(src).unwrap(), &dataset(), &params).unwrap()
    }

    #[test]
    fn first_match_projection() {
        let v = run(
            r#"*[_type == "agent" && userId == $userId][0]{ _id, onboardingComplete }"#,
            json!({"userId": "u1"}),
        );
        assert_eq!(v, json!({"_id": "agent-u1", "onboardingComplete": true}));
    }

    #[test]
    fn root_object_literal_evaluates_its_fields() {
        let v = run(
            r#"{
              "listings": count(*[_type == "property" && agent._ref == $agentId]),
              "newLeads": count(*[_type == "lead" && status == "new"])
            }"#,
            json!({"agentId": "agent-u1"}),
        );
        assert_eq!(v, json!({"listings": 2, "newLeads": 1}));
    }

    #[test]
    fn missing_first_match_is_null() {
        let v = run(
            r#"*[_type == "agent" && userId == $userId][0]{ _id }"#,
            json!({"userId": "nobody"}),
        );
        assert_eq!(v, Value::Null);
    }

    #[test]
    fn order_desc_and_slice() {
        let v = run(
            r#"*[_type == "property"] | order(createdAt desc) [0...1] { title }"#,
            json!({}),
        );
        assert_eq!(v, json!([{"title": "Cottage"}]));
    }

    #[test]
    fn numeric_comparison_mixes_ints_and_floats() {
        let v = run(
            r#"*[_type == "property" && price >= $min] { _id }"#,
            json!({"min": 150000}),
        );
        assert_eq!(v, json!([{"_id": "p1"}, {"_id": "p2"}]));
    }

    #[test]
    fn count_with_parent_scope() {
        let v = run(
            r#"*[_type == "property"] | order(title asc) { title, "leadCount": count(*[_type == "lead" && property._ref == ^._id]) }"#,
            json!({}),
        );
        assert_eq!(
            v,
            json!([{"title": "Cottage", "leadCount": 0}, {"title": "Loft", "leadCount": 2}])
        );
    }

    #[test]
    fn traverse_and_dereference_arrays() {
        let v = run(
            r#"*[_type == "user" && clerkId == $id][0]{ "savedIds": savedListings[]._ref, savedListings[]->{ title } }"#,
            json!({"id": "u9"}),
        );
        assert_eq!(
            v,
            json!({"savedIds": ["p2", "p1"], "savedListings": [{"title": "Cottage"}, {"title": "Loft"}]})
        );
    }

    #[test]
    fn dereference_single_reference() {
        let v = run(r#"*[_id == "p1"][0]{ "agentName": agent->name }"#, json!({}));
        assert_eq!(v, json!({"agentName": "Ada"}));
    }

    #[test]
    fn optional_filters_with_empty_params() {
        let src = r#"count(*[_type == "property" && ($status == "" || status == $status)])"#;
        assert_eq!(run(src, json!({"status": ""})), json!(2));
        assert_eq!(run(src, json!({"status": "sold"})), json!(1));
    }

    #[test]
    fn missing_parameter_is_an_error() {
        let err = evaluate(&parse("*[userId == $userId]").unwrap(), &dataset(), &json!({}))
            .unwrap_err();
        assert!(matches!(err, EvalError::MissingParam(p) if p == "userId"));
    }

    #[test]
    fn eval_filter_on_single_document() {
        let expr = parse(r#"author._ref == "user1" && !draft"#).unwrap();
        let doc = json!({"author": {"_ref": "user1"}, "draft": false});
        assert!(eval_filter(&expr, &doc, &json!({})).unwrap());
    }
}
