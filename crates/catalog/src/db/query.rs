//! Composable SELECT builder: a base query, any number of `(predicate, args)` fragments,
//! an ordering and a page window. Predicates are ANDed in insertion order.

use rusqlite::types::Value;

#[derive(Debug, Clone)]
pub struct Query {
    base: String,
    predicates: Vec<String>,
    args: Vec<Value>,
    order_by: Option<String>,
    page: Option<(i64, i64)>,
}

impl Query {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            predicates: Vec::new(),
            args: Vec::new(),
            order_by: None,
            page: None,
        }
    }

    /// Adds a predicate using anonymous `?` placeholders bound to `args` in order.
    pub fn filter<I>(&mut self, predicate: impl Into<String>, args: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.predicates.push(predicate.into());
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn order_by(&mut self, expr: impl Into<String>) -> &mut Self {
        self.order_by = Some(expr.into());
        self
    }

    pub fn limit(&mut self, limit: i64, offset: i64) -> &mut Self {
        self.page = Some((limit, offset));
        self
    }

    /// Renders the SQL text and the argument list in placeholder order.
    pub fn build(&self) -> (String, Vec<Value>) {
        let mut sql = self.base.clone();
        let mut args = self.args.clone();

        for (idx, predicate) in self.predicates.iter().enumerate() {
            sql.push_str(if idx == 0 { " WHERE (" } else { " AND (" });
            sql.push_str(predicate);
            sql.push(')');
        }
        if let Some(order_by) = &self.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order_by);
        }
        if let Some((limit, offset)) = self.page {
            sql.push_str(" LIMIT ? OFFSET ?");
            args.push(Value::Integer(limit));
            args.push(Value::Integer(offset));
        }
        (sql, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_query_is_untouched() {
        let (sql, args) = Query::new("SELECT * FROM images i").build();
        assert_eq!(sql, "SELECT * FROM images i");
        assert!(args.is_empty());
    }

    #[test]
    fn predicates_order_and_page_compose() {
        let mut q = Query::new("SELECT * FROM images i");
        q.filter("i.width > ?", [640_i64])
            .filter("i.height > ? AND i.height < ?", [100_i64, 900])
            .order_by("i.created DESC")
            .limit(20, 40);
        let (sql, args) = q.build();
        assert_eq!(
            sql,
            "SELECT * FROM images i WHERE (i.width > ?) AND (i.height > ? AND i.height < ?) \
             ORDER BY i.created DESC LIMIT ? OFFSET ?"
        );
        assert_eq!(
            args,
            vec![
                Value::Integer(640),
                Value::Integer(100),
                Value::Integer(900),
                Value::Integer(20),
                Value::Integer(40),
            ]
        );
    }
}
