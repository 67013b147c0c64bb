use serde::{Deserialize, Serialize};

/// GROQ abstract syntax tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    // Literals
    StringLiteral(String),
    IntLiteral(i64),
    FloatLiteral(f64),
    BoolLiteral(bool),
    Null,
    Array(Vec<Expr>),

    // Identifiers & access
    Ident(String),
    DotAccess(Box<Expr>, String),
    /// `base->`: resolve a reference (or array of references) to documents.
    Deref(Box<Expr>),
    This,
    Parent,
    Param(String),

    // Comparison operators
    Eq(Box<Expr>, Box<Expr>),
    Neq(Box<Expr>, Box<Expr>),
    Lt(Box<Expr>, Box<Expr>),
    Gt(Box<Expr>, Box<Expr>),
    Lte(Box<Expr>, Box<Expr>),
    Gte(Box<Expr>, Box<Expr>),
    In(Box<Expr>, Box<Expr>),

    // Logical operators
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),

    // Query constructs
    /// `*`: every document in the dataset.
    Everything,
    /// `base[predicate]`
    Filter(Box<Expr>, Box<Expr>),
    /// `base[index]`
    Element(Box<Expr>, i64),
    /// `base[start..end]` (inclusive) or `base[start...end]` (exclusive).
    Slice {
        base: Box<Expr>,
        start: Box<Expr>,
        end: Box<Expr>,
        inclusive: bool,
    },
    /// `base[]`
    Traverse(Box<Expr>),
    /// `base{...}`
    Projection(Box<Expr>, Vec<ProjectionField>),
    /// `base | order(...)`
    Order(Box<Expr>, Vec<OrderTerm>),

    // Function call
    FuncCall(String, Vec<Expr>),
}

/// One entry inside a `{ ... }` projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProjectionField {
    /// `...`: copy every attribute of the current object.
    Spread,
    /// `name` or `"alias": expr`
    Named(String, Expr),
}

/// One `expr asc|desc` term of an `order(...)` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderTerm {
    pub expr: Expr,
    pub ascending: bool,
}

impl Expr {
    /// Document types this expression pins with `_type == "literal"`.
    ///
    /// Stores use the list to narrow the candidate set before evaluation.
    /// An empty list means the query could touch any type.
    pub fn referenced_types(&self) -> Vec<String> {
        let mut types = Vec::new();
        self.walk(&mut |expr| {
            if let Expr::Eq(l, r) = expr {
                let literal = match (l.as_ref(), r.as_ref()) {
                    (Expr::Ident(name), Expr::StringLiteral(t))
                    | (Expr::StringLiteral(t), Expr::Ident(name))
                        if name == "_type" =>
                    {
                        Some(t)
                    }
                    _ => None,
                };
                if let Some(t) = literal {
                    if !types.contains(t) {
                        types.push(t.clone());
                    }
                }
            }
        });
        types
    }

    /// Whether evaluating this expression may follow references to other documents.
    pub fn has_dereference(&self) -> bool {
        let mut found = false;
        self.walk(&mut |expr| {
            if matches!(expr, Expr::Deref(_)) {
                found = true;
            }
        });
        found
    }

    /// Whether the expression selects documents that are not pinned by a `_type` filter.
    pub fn scans_untyped(&self) -> bool {
        self.has_dereference() || self.referenced_types().is_empty()
    }

    fn walk(&self, visit: &mut dyn FnMut(&Expr)) {
        visit(self);
        match self {
            Expr::StringLiteral(_)
            | Expr::IntLiteral(_)
            | Expr::FloatLiteral(_)
            | Expr::BoolLiteral(_)
            | Expr::Null
            | Expr::Ident(_)
            | Expr::This
            | Expr::Parent
            | Expr::Param(_)
            | Expr::Everything => {}
            Expr::Array(items) | Expr::FuncCall(_, items) => {
                items.iter().for_each(|e| e.walk(visit))
            }
            Expr::DotAccess(base, _)
            | Expr::Deref(base)
            | Expr::Not(base)
            | Expr::Element(base, _)
            | Expr::Traverse(base) => base.walk(visit),
            Expr::Eq(l, r)
            | Expr::Neq(l, r)
            | Expr::Lt(l, r)
            | Expr::Gt(l, r)
            | Expr::Lte(l, r)
            | Expr::Gte(l, r)
            | Expr::In(l, r)
            | Expr::And(l, r)
            | Expr::Or(l, r)
            | Expr::Filter(l, r) => {
                l.walk(visit);
                r.walk(visit);
            }
            Expr::Slice {
                base, start, end, ..
            } => {
                base.walk(visit);
                start.walk(visit);
                end.walk(visit);
            }
            Expr::Projection(base, fields) => {
                base.walk(visit);
                for field in fields {
                    if let ProjectionField::Named(_, e) = field {
                        e.walk(visit);
                    }
                }
            }
            Expr::Order(base, terms) => {
                base.walk(visit);
                terms.iter().for_each(|t| t.expr.walk(visit));
            }
        }
    }
}
