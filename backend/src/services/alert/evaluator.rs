use regex::Regex;
use serde_json::Value as JsonValue;

use super::ast::{BinOp, Expr, UnOp};
use crate::models::Row;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Bool(bool),
    Str(String),
}

impl Value {
    pub fn truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
        }
    }

    fn as_number(&self) -> Result<f64, String> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Str(s) => s.parse().map_err(|_| format!("cannot coerce '{s}' to a number")),
        }
    }

    pub fn to_display_string(&self) -> String {
        match self {
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Str(s) => s.clone(),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Number(n) => serde_json::json!(n),
            Value::Bool(b) => serde_json::json!(b),
            Value::Str(s) => serde_json::json!(s),
        }
    }
}

fn json_to_value(json: &JsonValue) -> Value {
    match json {
        JsonValue::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::String(s) => Value::Str(s.clone()),
        other => Value::Str(other.to_string()),
    }
}

/// Evaluates an expression over a row's columns. Total and side-effect-free:
/// every failure path returns a descriptive `Err` rather than panicking.
pub fn eval(expr: &Expr, row: &Row) -> Result<Value, String> {
    match expr {
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Ident(name) => row
            .get(name)
            .map(json_to_value)
            .ok_or_else(|| format!("unknown column: {name}")),
        Expr::Unary(op, inner) => {
            let value = eval(inner, row)?;
            match op {
                UnOp::Neg => Ok(Value::Number(-value.as_number()?)),
                UnOp::Not => Ok(Value::Bool(!value.truthy())),
            }
        }
        Expr::Binary(op, lhs, rhs) => eval_binary(*op, lhs, rhs, row),
        Expr::Call(name, args) => eval_call(name, args, row),
    }
}

fn eval_binary(op: BinOp, lhs: &Expr, rhs: &Expr, row: &Row) -> Result<Value, String> {
    if op == BinOp::And {
        let l = eval(lhs, row)?;
        if !l.truthy() {
            return Ok(Value::Bool(false));
        }
        return Ok(Value::Bool(eval(rhs, row)?.truthy()));
    }
    if op == BinOp::Or {
        let l = eval(lhs, row)?;
        if l.truthy() {
            return Ok(Value::Bool(true));
        }
        return Ok(Value::Bool(eval(rhs, row)?.truthy()));
    }

    let l = eval(lhs, row)?;
    let r = eval(rhs, row)?;

    match op {
        BinOp::Add => Ok(Value::Number(l.as_number()? + r.as_number()?)),
        BinOp::Sub => Ok(Value::Number(l.as_number()? - r.as_number()?)),
        BinOp::Mul => Ok(Value::Number(l.as_number()? * r.as_number()?)),
        BinOp::Div => {
            let divisor = r.as_number()?;
            if divisor == 0.0 {
                return Err("division by zero".to_string());
            }
            Ok(Value::Number(l.as_number()? / divisor))
        }
        BinOp::Mod => {
            let divisor = r.as_number()?;
            if divisor == 0.0 {
                return Err("modulo by zero".to_string());
            }
            Ok(Value::Number(l.as_number()? % divisor))
        }
        BinOp::Eq => Ok(Value::Bool(values_equal(&l, &r))),
        BinOp::Ne => Ok(Value::Bool(!values_equal(&l, &r))),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => compare(op, &l, &r),
        BinOp::And | BinOp::Or => unreachable!("handled above with short-circuiting"),
    }
}

fn values_equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Str(a), Value::Str(b)) => a == b,
        _ => match (l.as_number(), r.as_number()) {
            (Ok(a), Ok(b)) => a == b,
            _ => l.to_display_string() == r.to_display_string(),
        },
    }
}

fn compare(op: BinOp, l: &Value, r: &Value) -> Result<Value, String> {
    let ordering = match (l.as_number(), r.as_number()) {
        (Ok(a), Ok(b)) => a.partial_cmp(&b).ok_or("NaN comparison")?,
        _ => l.to_display_string().cmp(&r.to_display_string()),
    };
    let result = match op {
        BinOp::Lt => ordering.is_lt(),
        BinOp::Le => ordering.is_le(),
        BinOp::Gt => ordering.is_gt(),
        BinOp::Ge => ordering.is_ge(),
        _ => unreachable!(),
    };
    Ok(Value::Bool(result))
}

fn eval_call(name: &str, args: &[Expr], row: &Row) -> Result<Value, String> {
    match name {
        "len" => {
            if args.len() != 1 {
                return Err("len() takes exactly one argument".to_string());
            }
            let value = eval(&args[0], row)?;
            Ok(Value::Number(value.to_display_string().chars().count() as f64))
        }
        "contains" => {
            if args.len() != 2 {
                return Err("contains() takes exactly two arguments".to_string());
            }
            let haystack = eval(&args[0], row)?.to_display_string();
            let needle = eval(&args[1], row)?.to_display_string();
            Ok(Value::Bool(haystack.contains(&needle)))
        }
        "matches" => {
            if args.len() != 2 {
                return Err("matches() takes exactly two arguments".to_string());
            }
            let subject = eval(&args[0], row)?.to_display_string();
            let pattern = eval(&args[1], row)?.to_display_string();
            let re = Regex::new(&pattern).map_err(|e| format!("invalid regex '{pattern}': {e}"))?;
            Ok(Value::Bool(re.is_match(&subject)))
        }
        other => Err(format!("unknown function: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::alert::parser::parse;

    fn row(pairs: &[(&str, JsonValue)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn tablespace_alert_fires_above_threshold() {
        let expr = parse("used_rate >= 90").unwrap();
        let r = row(&[("used_rate", serde_json::json!(92.0))]);
        assert!(eval(&expr, &r).unwrap().truthy());
    }

    #[test]
    fn tablespace_alert_does_not_fire_below_threshold() {
        let expr = parse("used_rate >= 90").unwrap();
        let r = row(&[("used_rate", serde_json::json!(50.0))]);
        assert!(!eval(&expr, &r).unwrap().truthy());
    }

    #[test]
    fn contains_function_matches_substring() {
        let expr = parse("contains(message, 'ORA-')").unwrap();
        let r = row(&[("message", serde_json::json!("ORA-00600 internal error"))]);
        assert!(eval(&expr, &r).unwrap().truthy());
    }

    #[test]
    fn division_by_zero_is_an_error_not_a_panic() {
        let expr = parse("1 / 0").unwrap();
        let r = row(&[]);
        assert!(eval(&expr, &r).is_err());
    }

    #[test]
    fn unknown_column_is_an_error() {
        let expr = parse("missing_col > 1").unwrap();
        let r = row(&[]);
        assert!(eval(&expr, &r).is_err());
    }

    #[test]
    fn logical_and_short_circuits() {
        let expr = parse("false_flag && (1 / 0 > 0)").unwrap();
        let r = row(&[("false_flag", serde_json::json!(false))]);
        assert_eq!(eval(&expr, &r).unwrap(), Value::Bool(false));
    }
}
