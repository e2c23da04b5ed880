//! FILENAME: core/engine/src/evaluator.rs
//! PURPOSE: Evaluates expression ASTs against a row of typed values.
//! CONTEXT: Filter predicates and formatter rules are parsed once into an AST
//! and then evaluated for every row. This module traverses the tree, looks up
//! sibling columns and the formatted cell's own value through an
//! `EvalContext`, and computes the result. Aggregates over a bare column
//! reference read that column across the whole dataset.
//!
//! SUPPORTED FEATURES:
//! - Literal evaluation: Numbers, Strings, Booleans
//! - Column lookup by alias, and `@` for the current cell
//! - Binary operations: +, -, *, /, ^, &, =, <>, <, >, <=, >=, AND, OR
//! - Unary operations: - (negation), NOT
//! - Date arithmetic: date +/- days, date - date
//! - Functions: SUM, AVERAGE, MIN, MAX, COUNT, ROWS, ROWNUM, IF, AND, OR,
//!              ABS, ROUND, FLOOR, CEILING, SQRT, POWER, MOD, INT, LEN, UPPER,
//!              LOWER, TRIM, CONCAT, LEFT, RIGHT, MID, REPT, TEXT, CONTAINS,
//!              STARTSWITH, ENDSWITH, ISBLANK, ISNUMBER, ISTEXT, DATE, YEAR,
//!              MONTH, DAY, HOUR, MINUTE
//!
//! Every node visited and every dataset value aggregated costs one step.
//! Once the step budget is spent evaluation stops with `EvalError::StepLimit`.

use crate::date_format::DateFormat;
use crate::number_format::{format_general, NumberFormatSpec};
use crate::value::TypedValue;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use parser::{BinaryOperator, BuiltinFunction, Expression, UnaryOperator, Value};
use std::cell::Cell;
use std::cmp::Ordering;
use std::fmt;

/// Default number of steps a single evaluation may take.
pub const DEFAULT_STEP_LIMIT: usize = 1_000_000;

/// Longest text a string function may produce.
pub const MAX_TEXT_LEN: usize = 32_767;

/// Largest day offset accepted in date arithmetic.
const MAX_DAY_SHIFT: f64 = 3_650_000.0;

/// Errors produced while evaluating an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvalError {
    /// Division by zero.
    Div0,
    /// Operand of the wrong type.
    Value,
    /// Unknown column, or `@` outside a formatter.
    Ref,
    /// Numeric result out of range.
    Num,
    /// The step budget was exhausted.
    StepLimit,
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::Div0 => write!(f, "#DIV/0!"),
            EvalError::Value => write!(f, "#VALUE!"),
            EvalError::Ref => write!(f, "#REF!"),
            EvalError::Num => write!(f, "#NUM!"),
            EvalError::StepLimit => write!(f, "#STEPS!"),
        }
    }
}

impl std::error::Error for EvalError {}

/// The result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalResult {
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Error(EvalError),
}

impl EvalResult {
    /// Lifts a typed cell value into an evaluation result.
    pub fn from_typed(value: &TypedValue) -> Self {
        match value {
            TypedValue::Empty => EvalResult::Empty,
            TypedValue::Text(s) => EvalResult::Text(s.clone()),
            TypedValue::Number { value, .. } => EvalResult::Number(*value),
            TypedValue::Boolean(b) => EvalResult::Boolean(*b),
            TypedValue::Date { value, .. } => EvalResult::Date(*value),
            TypedValue::Time { value, .. } => EvalResult::Time(*value),
            TypedValue::DateTime { value, .. } => EvalResult::DateTime(*value),
        }
    }

    /// Attempts to coerce the result to a number.
    /// Empty counts as zero; temporal values do not coerce.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            EvalResult::Empty => Some(0.0),
            EvalResult::Number(n) => Some(*n),
            EvalResult::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            EvalResult::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    /// Attempts to coerce the result to a boolean.
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            EvalResult::Empty => Some(false),
            EvalResult::Boolean(b) => Some(*b),
            EvalResult::Number(n) => Some(*n != 0.0),
            EvalResult::Text(s) => {
                let upper = s.trim().to_uppercase();
                if upper == "TRUE" {
                    Some(true)
                } else if upper == "FALSE" {
                    Some(false)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Converts the result to its display text.
    pub fn as_text(&self) -> String {
        match self {
            EvalResult::Empty => String::new(),
            EvalResult::Number(n) => format_general(*n),
            EvalResult::Text(s) => s.clone(),
            EvalResult::Boolean(b) => {
                if *b {
                    "TRUE".to_string()
                } else {
                    "FALSE".to_string()
                }
            }
            EvalResult::Date(d) => d.format("%Y-%m-%d").to_string(),
            EvalResult::Time(t) => {
                if t.second() == 0 {
                    t.format("%H:%M").to_string()
                } else {
                    t.format("%H:%M:%S").to_string()
                }
            }
            EvalResult::DateTime(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
            EvalResult::Error(e) => e.to_string(),
        }
    }

    /// Returns true if this result is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, EvalResult::Error(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, EvalResult::Empty)
    }

    fn is_temporal(&self) -> bool {
        matches!(
            self,
            EvalResult::Date(_) | EvalResult::Time(_) | EvalResult::DateTime(_)
        )
    }

    /// Instant used to compare temporal values. Text in ISO form is accepted.
    fn as_instant(&self) -> Option<NaiveDateTime> {
        match self {
            EvalResult::Date(d) => Some(d.and_time(NaiveTime::MIN)),
            EvalResult::DateTime(dt) => Some(*dt),
            EvalResult::Time(t) => Some(NaiveDate::MIN.and_time(*t)),
            EvalResult::Text(s) => parse_iso_instant(s),
            _ => None,
        }
    }

    fn as_date(&self) -> Option<NaiveDate> {
        match self {
            EvalResult::Date(d) => Some(*d),
            EvalResult::DateTime(dt) => Some(dt.date()),
            EvalResult::Text(s) => parse_iso_date(s),
            _ => None,
        }
    }

    fn as_time(&self) -> Option<NaiveTime> {
        match self {
            EvalResult::Time(t) => Some(*t),
            EvalResult::DateTime(dt) => Some(dt.time()),
            EvalResult::Text(s) => parse_iso_instant(s).map(|dt| dt.time()),
            _ => None,
        }
    }
}

impl From<&TypedValue> for EvalResult {
    fn from(value: &TypedValue) -> Self {
        EvalResult::from_typed(value)
    }
}

/// What an expression can see while it is evaluated.
pub trait EvalContext {
    /// The typed value of a column of the current row, by alias.
    fn column_value(&self, alias: &str) -> Option<&TypedValue>;

    /// The typed value of the cell being formatted. `None` outside formatters.
    fn current_value(&self) -> Option<&TypedValue>;

    /// Every row's value for a column, in dataset order.
    fn dataset_column(&self, alias: &str) -> Option<Vec<&TypedValue>>;

    /// Number of rows in the dataset.
    fn row_count(&self) -> usize;

    /// Zero-based position of the current row in the dataset.
    fn row_index(&self) -> Option<usize>;
}

/// The expression evaluator.
/// Holds a reference to the row context and the remaining step budget.
pub struct Evaluator<'a> {
    ctx: &'a dyn EvalContext,
    steps: Cell<usize>,
    limit: usize,
}

impl<'a> Evaluator<'a> {
    /// Creates an evaluator with the default step budget.
    pub fn new(ctx: &'a dyn EvalContext) -> Self {
        Self::with_step_limit(ctx, DEFAULT_STEP_LIMIT)
    }

    pub fn with_step_limit(ctx: &'a dyn EvalContext, limit: usize) -> Self {
        Evaluator {
            ctx,
            steps: Cell::new(0),
            limit,
        }
    }

    /// Steps consumed so far.
    pub fn steps_used(&self) -> usize {
        self.steps.get()
    }

    /// Charges one step. Returns false once the budget is exhausted.
    fn tick(&self) -> bool {
        let used = self.steps.get() + 1;
        self.steps.set(used);
        used <= self.limit
    }

    /// Evaluates an AST expression and returns the result.
    pub fn evaluate(&self, expr: &Expression) -> EvalResult {
        if !self.tick() {
            return EvalResult::Error(EvalError::StepLimit);
        }

        match expr {
            Expression::Literal(value) => self.eval_literal(value),
            Expression::Column(alias) => match self.ctx.column_value(alias) {
                Some(value) => EvalResult::from_typed(value),
                None => EvalResult::Error(EvalError::Ref),
            },
            Expression::CurrentValue => match self.ctx.current_value() {
                Some(value) => EvalResult::from_typed(value),
                None => EvalResult::Error(EvalError::Ref),
            },
            Expression::BinaryOp { left, op, right } => self.eval_binary_op(left, op, right),
            Expression::UnaryOp { op, operand } => self.eval_unary_op(op, operand),
            Expression::FunctionCall { func, args } => self.eval_function(*func, args),
        }
    }

    fn eval_literal(&self, value: &Value) -> EvalResult {
        match value {
            Value::Number(n) => EvalResult::Number(*n),
            Value::String(s) => EvalResult::Text(s.clone()),
            Value::Boolean(b) => EvalResult::Boolean(*b),
        }
    }

    // ==================== Operators ====================

    fn eval_binary_op(
        &self,
        left: &Expression,
        op: &BinaryOperator,
        right: &Expression,
    ) -> EvalResult {
        // Connectives short-circuit, so the right side is evaluated lazily
        match op {
            BinaryOperator::And => return self.eval_connective(left, right, false),
            BinaryOperator::Or => return self.eval_connective(left, right, true),
            _ => {}
        }

        let left_val = self.evaluate(left);
        if let EvalResult::Error(e) = left_val {
            return EvalResult::Error(e);
        }
        let right_val = self.evaluate(right);
        if let EvalResult::Error(e) = right_val {
            return EvalResult::Error(e);
        }

        match op {
            BinaryOperator::Add => eval_add(&left_val, &right_val),
            BinaryOperator::Subtract => eval_subtract(&left_val, &right_val),
            BinaryOperator::Multiply => numeric(&left_val, &right_val, |l, r| Ok(l * r)),
            BinaryOperator::Divide => numeric(&left_val, &right_val, |l, r| {
                if r == 0.0 {
                    Err(EvalError::Div0)
                } else {
                    Ok(l / r)
                }
            }),
            BinaryOperator::Power => numeric(&left_val, &right_val, |l, r| Ok(l.powf(r))),
            BinaryOperator::Concat => {
                let mut text = left_val.as_text();
                text.push_str(&right_val.as_text());
                bounded_text(text)
            }
            BinaryOperator::Equal => {
                EvalResult::Boolean(compare(&left_val, &right_val) == Some(Ordering::Equal))
            }
            BinaryOperator::NotEqual => {
                EvalResult::Boolean(compare(&left_val, &right_val) != Some(Ordering::Equal))
            }
            BinaryOperator::LessThan => ordered(&left_val, &right_val, Ordering::is_lt),
            BinaryOperator::GreaterThan => ordered(&left_val, &right_val, Ordering::is_gt),
            BinaryOperator::LessEqual => ordered(&left_val, &right_val, Ordering::is_le),
            BinaryOperator::GreaterEqual => ordered(&left_val, &right_val, Ordering::is_ge),
            BinaryOperator::And | BinaryOperator::Or => EvalResult::Error(EvalError::Value),
        }
    }

    /// AND / OR. `stop_on` is the value that decides the result early.
    fn eval_connective(&self, left: &Expression, right: &Expression, stop_on: bool) -> EvalResult {
        for side in [left, right] {
            let value = self.evaluate(side);
            if let EvalResult::Error(e) = value {
                return EvalResult::Error(e);
            }
            match value.as_boolean() {
                Some(b) if b == stop_on => return EvalResult::Boolean(stop_on),
                Some(_) => {}
                None => return EvalResult::Error(EvalError::Value),
            }
        }
        EvalResult::Boolean(!stop_on)
    }

    fn eval_unary_op(&self, op: &UnaryOperator, operand: &Expression) -> EvalResult {
        let val = self.evaluate(operand);

        if let EvalResult::Error(e) = &val {
            return EvalResult::Error(*e);
        }

        match op {
            UnaryOperator::Negate => match val.as_number() {
                Some(n) => EvalResult::Number(-n),
                None => EvalResult::Error(EvalError::Value),
            },
            UnaryOperator::Not => match val.as_boolean() {
                Some(b) => EvalResult::Boolean(!b),
                None => EvalResult::Error(EvalError::Value),
            },
        }
    }

    // ==================== Functions ====================

    fn eval_function(&self, func: BuiltinFunction, args: &[Expression]) -> EvalResult {
        let (min, max) = func.arity();
        if args.len() < min || max.is_some_and(|m| args.len() > m) {
            return EvalResult::Error(EvalError::Value);
        }

        match func {
            // Aggregate functions
            BuiltinFunction::Sum => self.fn_sum(args),
            BuiltinFunction::Average => self.fn_average(args),
            BuiltinFunction::Min => self.fn_extreme(args, f64::min),
            BuiltinFunction::Max => self.fn_extreme(args, f64::max),
            BuiltinFunction::Count => self.fn_count(args),

            // Dataset functions
            BuiltinFunction::Rows => EvalResult::Number(self.ctx.row_count() as f64),
            BuiltinFunction::RowNum => match self.ctx.row_index() {
                Some(index) => EvalResult::Number((index + 1) as f64),
                None => EvalResult::Error(EvalError::Ref),
            },

            // Logical functions
            BuiltinFunction::If => self.fn_if(args),
            BuiltinFunction::And => self.fn_all_any(args, false),
            BuiltinFunction::Or => self.fn_all_any(args, true),

            // Math functions
            BuiltinFunction::Abs => self.unary_number(&args[0], |n| Ok(n.abs())),
            BuiltinFunction::Round => self.fn_round(args),
            BuiltinFunction::Floor => self.unary_number(&args[0], |n| Ok(n.floor())),
            BuiltinFunction::Ceiling => self.unary_number(&args[0], |n| Ok(n.ceil())),
            BuiltinFunction::Int => self.unary_number(&args[0], |n| Ok(n.floor())),
            BuiltinFunction::Sqrt => self.unary_number(&args[0], |n| {
                if n < 0.0 {
                    Err(EvalError::Num)
                } else {
                    Ok(n.sqrt())
                }
            }),
            BuiltinFunction::Power => {
                self.binary_number(&args[0], &args[1], |base, exp| Ok(base.powf(exp)))
            }
            BuiltinFunction::Mod => self.binary_number(&args[0], &args[1], |num, divisor| {
                if divisor == 0.0 {
                    Err(EvalError::Div0)
                } else {
                    // Result has the sign of the divisor
                    Ok(num - divisor * (num / divisor).floor())
                }
            }),

            // Text functions
            BuiltinFunction::Len => {
                self.unary_text(&args[0], |s| EvalResult::Number(s.chars().count() as f64))
            }
            BuiltinFunction::Upper => self.unary_text(&args[0], |s| EvalResult::Text(s.to_uppercase())),
            BuiltinFunction::Lower => self.unary_text(&args[0], |s| EvalResult::Text(s.to_lowercase())),
            BuiltinFunction::Trim => self.unary_text(&args[0], |s| {
                // Collapse internal whitespace as well
                EvalResult::Text(s.split_whitespace().collect::<Vec<&str>>().join(" "))
            }),
            BuiltinFunction::Concat => self.fn_concat(args),
            BuiltinFunction::Left => self.fn_slice(args, true),
            BuiltinFunction::Right => self.fn_slice(args, false),
            BuiltinFunction::Mid => self.fn_mid(args),
            BuiltinFunction::Rept => self.fn_rept(args),
            BuiltinFunction::Text => self.fn_text(args),
            BuiltinFunction::Contains => self.text_predicate(args, |h, n| h.contains(n)),
            BuiltinFunction::StartsWith => self.text_predicate(args, |h, n| h.starts_with(n)),
            BuiltinFunction::EndsWith => self.text_predicate(args, |h, n| h.ends_with(n)),

            // Information functions
            BuiltinFunction::IsBlank => self.inspect(&args[0], |v| match v {
                EvalResult::Empty => true,
                EvalResult::Text(s) => s.is_empty(),
                _ => false,
            }),
            BuiltinFunction::IsNumber => self.inspect(&args[0], |v| matches!(v, EvalResult::Number(_))),
            BuiltinFunction::IsText => self.inspect(&args[0], |v| matches!(v, EvalResult::Text(_))),

            // Date functions
            BuiltinFunction::Date => self.fn_date(args),
            BuiltinFunction::Year => self.date_part(&args[0], |d| d.year() as f64),
            BuiltinFunction::Month => self.date_part(&args[0], |d| d.month() as f64),
            BuiltinFunction::Day => self.date_part(&args[0], |d| d.day() as f64),
            BuiltinFunction::Hour => self.time_part(&args[0], |t| t.hour() as f64),
            BuiltinFunction::Minute => self.time_part(&args[0], |t| t.minute() as f64),
        }
    }

    /// Gathers the values an aggregate runs over.
    ///
    /// A single bare column argument reads that column across the dataset;
    /// otherwise each argument is evaluated in the current row.
    fn aggregate_values(&self, args: &[Expression]) -> Result<Vec<EvalResult>, EvalError> {
        if let [Expression::Column(alias)] = args {
            let column = self.ctx.dataset_column(alias).ok_or(EvalError::Ref)?;
            let mut values = Vec::with_capacity(column.len());
            for value in column {
                if !self.tick() {
                    return Err(EvalError::StepLimit);
                }
                values.push(EvalResult::from_typed(value));
            }
            return Ok(values);
        }

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            match self.evaluate(arg) {
                EvalResult::Error(e) => return Err(e),
                value => values.push(value),
            }
        }
        Ok(values)
    }

    /// Numeric inputs of an aggregate. Non-numeric values are skipped.
    fn aggregate_numbers(&self, args: &[Expression]) -> Result<Vec<f64>, EvalError> {
        let values = self.aggregate_values(args)?;
        Ok(values
            .iter()
            .filter_map(|v| match v {
                EvalResult::Number(n) => Some(*n),
                EvalResult::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
                _ => None,
            })
            .collect())
    }

    fn fn_sum(&self, args: &[Expression]) -> EvalResult {
        match self.aggregate_numbers(args) {
            Ok(numbers) => EvalResult::Number(numbers.iter().sum()),
            Err(e) => EvalResult::Error(e),
        }
    }

    fn fn_average(&self, args: &[Expression]) -> EvalResult {
        match self.aggregate_numbers(args) {
            Ok(numbers) if numbers.is_empty() => EvalResult::Error(EvalError::Div0),
            Ok(numbers) => {
                let sum: f64 = numbers.iter().sum();
                EvalResult::Number(sum / numbers.len() as f64)
            }
            Err(e) => EvalResult::Error(e),
        }
    }

    fn fn_extreme(&self, args: &[Expression], pick: fn(f64, f64) -> f64) -> EvalResult {
        match self.aggregate_numbers(args) {
            Ok(numbers) => match numbers.into_iter().reduce(pick) {
                Some(n) => EvalResult::Number(n),
                None => EvalResult::Number(0.0),
            },
            Err(e) => EvalResult::Error(e),
        }
    }

    fn fn_count(&self, args: &[Expression]) -> EvalResult {
        // COUNT counts every non-empty value
        match self.aggregate_values(args) {
            Ok(values) => {
                let count = values
                    .iter()
                    .filter(|v| match v {
                        EvalResult::Empty => false,
                        EvalResult::Text(s) => !s.is_empty(),
                        _ => true,
                    })
                    .count();
                EvalResult::Number(count as f64)
            }
            Err(e) => EvalResult::Error(e),
        }
    }

    fn fn_if(&self, args: &[Expression]) -> EvalResult {
        let condition = self.evaluate(&args[0]);
        if let EvalResult::Error(e) = condition {
            return EvalResult::Error(e);
        }

        if condition.as_boolean().unwrap_or(false) {
            self.evaluate(&args[1])
        } else if let Some(otherwise) = args.get(2) {
            self.evaluate(otherwise)
        } else {
            EvalResult::Boolean(false)
        }
    }

    fn fn_all_any(&self, args: &[Expression], stop_on: bool) -> EvalResult {
        for arg in args {
            let result = self.evaluate(arg);
            if let EvalResult::Error(e) = result {
                return EvalResult::Error(e);
            }
            match result.as_boolean() {
                Some(b) if b == stop_on => return EvalResult::Boolean(stop_on),
                Some(_) => {}
                None => return EvalResult::Error(EvalError::Value),
            }
        }
        EvalResult::Boolean(!stop_on)
    }

    fn fn_round(&self, args: &[Expression]) -> EvalResult {
        let num = match self.number_arg(&args[0]) {
            Ok(n) => n,
            Err(e) => return EvalResult::Error(e),
        };
        let digits = match args.get(1).map(|a| self.number_arg(a)).transpose() {
            Ok(d) => d.unwrap_or(0.0) as i32,
            Err(e) => return EvalResult::Error(e),
        };

        let multiplier = 10_f64.powi(digits.clamp(-15, 15));
        finite((num * multiplier).round() / multiplier)
    }

    fn fn_concat(&self, args: &[Expression]) -> EvalResult {
        let mut result = String::new();
        for arg in args {
            let val = self.evaluate(arg);
            if let EvalResult::Error(e) = val {
                return EvalResult::Error(e);
            }
            result.push_str(&val.as_text());
            if result.len() > MAX_TEXT_LEN {
                return EvalResult::Error(EvalError::Value);
            }
        }
        EvalResult::Text(result)
    }

    /// LEFT / RIGHT with an optional character count (default 1).
    fn fn_slice(&self, args: &[Expression], from_start: bool) -> EvalResult {
        let text = match self.text_arg(&args[0]) {
            Ok(t) => t,
            Err(e) => return EvalResult::Error(e),
        };
        let count = match args.get(1).map(|a| self.count_arg(a)).transpose() {
            Ok(n) => n.unwrap_or(1),
            Err(e) => return EvalResult::Error(e),
        };

        let result: String = if from_start {
            text.chars().take(count).collect()
        } else {
            let skip = text.chars().count().saturating_sub(count);
            text.chars().skip(skip).collect()
        };
        EvalResult::Text(result)
    }

    /// MID(text, start, count) with a 1-based start.
    fn fn_mid(&self, args: &[Expression]) -> EvalResult {
        let text = match self.text_arg(&args[0]) {
            Ok(t) => t,
            Err(e) => return EvalResult::Error(e),
        };
        let start = match self.number_arg(&args[1]) {
            Ok(s) if s < 1.0 => return EvalResult::Error(EvalError::Value),
            Ok(s) => s as usize,
            Err(e) => return EvalResult::Error(e),
        };
        let count = match self.count_arg(&args[2]) {
            Ok(n) => n,
            Err(e) => return EvalResult::Error(e),
        };

        EvalResult::Text(text.chars().skip(start - 1).take(count).collect())
    }

    fn fn_rept(&self, args: &[Expression]) -> EvalResult {
        let text = match self.text_arg(&args[0]) {
            Ok(t) => t,
            Err(e) => return EvalResult::Error(e),
        };
        let times = match self.count_arg(&args[1]) {
            Ok(n) => n,
            Err(e) => return EvalResult::Error(e),
        };

        if text.len().saturating_mul(times) > MAX_TEXT_LEN {
            return EvalResult::Error(EvalError::Value);
        }
        EvalResult::Text(text.repeat(times))
    }

    /// TEXT(value, pattern): numbers take a number pattern, temporal values
    /// a date pattern. Anything else renders as plain text.
    fn fn_text(&self, args: &[Expression]) -> EvalResult {
        let value = self.evaluate(&args[0]);
        if let EvalResult::Error(e) = value {
            return EvalResult::Error(e);
        }
        let pattern = match self.text_arg(&args[1]) {
            Ok(p) => p,
            Err(e) => return EvalResult::Error(e),
        };

        let text = match &value {
            EvalResult::Number(n) => match NumberFormatSpec::parse_pattern(&pattern) {
                Some(spec) => spec.format(*n),
                None => format_general(*n),
            },
            EvalResult::Date(d) => DateFormat::new(&pattern).format_date(*d),
            EvalResult::Time(t) => DateFormat::new(&pattern).format_time(*t),
            EvalResult::DateTime(dt) => DateFormat::new(&pattern).format_datetime(*dt),
            other => other.as_text(),
        };
        EvalResult::Text(text)
    }

    /// DATE(text) parses an ISO date; DATE(year, month, day) builds one.
    fn fn_date(&self, args: &[Expression]) -> EvalResult {
        match args {
            [text] => match self.evaluate(text) {
                EvalResult::Error(e) => EvalResult::Error(e),
                value => match value.as_date() {
                    Some(d) => EvalResult::Date(d),
                    None => EvalResult::Error(EvalError::Value),
                },
            },
            [year, month, day] => {
                let parts = [year, month, day].map(|a| self.number_arg(a));
                let (y, m, d) = match parts {
                    [Ok(y), Ok(m), Ok(d)] => (y, m, d),
                    [Err(e), _, _] | [_, Err(e), _] | [_, _, Err(e)] => {
                        return EvalResult::Error(e)
                    }
                };
                if !(0.0..=9999.0).contains(&y) || m < 1.0 || d < 1.0 {
                    return EvalResult::Error(EvalError::Num);
                }
                match NaiveDate::from_ymd_opt(y as i32, m as u32, d as u32) {
                    Some(date) => EvalResult::Date(date),
                    None => EvalResult::Error(EvalError::Num),
                }
            }
            _ => EvalResult::Error(EvalError::Value),
        }
    }

    // ==================== Argument helpers ====================

    fn number_arg(&self, arg: &Expression) -> Result<f64, EvalError> {
        match self.evaluate(arg) {
            EvalResult::Error(e) => Err(e),
            value => value.as_number().ok_or(EvalError::Value),
        }
    }

    /// A non-negative whole count.
    fn count_arg(&self, arg: &Expression) -> Result<usize, EvalError> {
        let n = self.number_arg(arg)?;
        if n < 0.0 {
            return Err(EvalError::Value);
        }
        Ok(n.min(MAX_TEXT_LEN as f64) as usize)
    }

    fn text_arg(&self, arg: &Expression) -> Result<String, EvalError> {
        match self.evaluate(arg) {
            EvalResult::Error(e) => Err(e),
            value => Ok(value.as_text()),
        }
    }

    fn unary_number(&self, arg: &Expression, f: impl Fn(f64) -> Result<f64, EvalError>) -> EvalResult {
        match self.number_arg(arg).and_then(f) {
            Ok(n) => finite(n),
            Err(e) => EvalResult::Error(e),
        }
    }

    fn binary_number(
        &self,
        a: &Expression,
        b: &Expression,
        f: impl Fn(f64, f64) -> Result<f64, EvalError>,
    ) -> EvalResult {
        let result = self
            .number_arg(a)
            .and_then(|x| self.number_arg(b).and_then(|y| f(x, y)));
        match result {
            Ok(n) => finite(n),
            Err(e) => EvalResult::Error(e),
        }
    }

    fn unary_text(&self, arg: &Expression, f: impl Fn(&str) -> EvalResult) -> EvalResult {
        match self.text_arg(arg) {
            Ok(text) => f(&text),
            Err(e) => EvalResult::Error(e),
        }
    }

    /// Case-insensitive (haystack, needle) test.
    fn text_predicate(&self, args: &[Expression], f: impl Fn(&str, &str) -> bool) -> EvalResult {
        let haystack = match self.text_arg(&args[0]) {
            Ok(t) => t.to_lowercase(),
            Err(e) => return EvalResult::Error(e),
        };
        let needle = match self.text_arg(&args[1]) {
            Ok(t) => t.to_lowercase(),
            Err(e) => return EvalResult::Error(e),
        };
        EvalResult::Boolean(f(&haystack, &needle))
    }

    fn inspect(&self, arg: &Expression, f: impl Fn(&EvalResult) -> bool) -> EvalResult {
        match self.evaluate(arg) {
            EvalResult::Error(e) => EvalResult::Error(e),
            value => EvalResult::Boolean(f(&value)),
        }
    }

    fn date_part(&self, arg: &Expression, f: impl Fn(NaiveDate) -> f64) -> EvalResult {
        match self.evaluate(arg) {
            EvalResult::Error(e) => EvalResult::Error(e),
            value => match value.as_date() {
                Some(d) => EvalResult::Number(f(d)),
                None => EvalResult::Error(EvalError::Value),
            },
        }
    }

    fn time_part(&self, arg: &Expression, f: impl Fn(NaiveTime) -> f64) -> EvalResult {
        match self.evaluate(arg) {
            EvalResult::Error(e) => EvalResult::Error(e),
            value => match value.as_time() {
                Some(t) => EvalResult::Number(f(t)),
                None => EvalResult::Error(EvalError::Value),
            },
        }
    }
}

// ==================== Operator helpers ====================

fn finite(n: f64) -> EvalResult {
    if n.is_finite() {
        EvalResult::Number(n)
    } else {
        EvalResult::Error(EvalError::Num)
    }
}

fn bounded_text(text: String) -> EvalResult {
    if text.len() > MAX_TEXT_LEN {
        EvalResult::Error(EvalError::Value)
    } else {
        EvalResult::Text(text)
    }
}

fn numeric(
    left: &EvalResult,
    right: &EvalResult,
    f: impl Fn(f64, f64) -> Result<f64, EvalError>,
) -> EvalResult {
    match (left.as_number(), right.as_number()) {
        (Some(l), Some(r)) => match f(l, r) {
            Ok(n) => finite(n),
            Err(e) => EvalResult::Error(e),
        },
        _ => EvalResult::Error(EvalError::Value),
    }
}

fn day_shift(days: f64) -> Result<Duration, EvalError> {
    if !days.is_finite() || days.abs() > MAX_DAY_SHIFT {
        return Err(EvalError::Num);
    }
    Ok(Duration::seconds((days * 86_400.0).round() as i64))
}

fn shift(value: &EvalResult, days: f64) -> EvalResult {
    let delta = match day_shift(days) {
        Ok(d) => d,
        Err(e) => return EvalResult::Error(e),
    };
    let shifted = match value {
        EvalResult::Date(d) => d
            .checked_add_signed(Duration::days(delta.num_days()))
            .map(EvalResult::Date),
        EvalResult::DateTime(dt) => dt.checked_add_signed(delta).map(EvalResult::DateTime),
        EvalResult::Time(t) => Some(EvalResult::Time(t.overflowing_add_signed(delta).0)),
        _ => None,
    };
    shifted.unwrap_or(EvalResult::Error(EvalError::Num))
}

fn eval_add(left: &EvalResult, right: &EvalResult) -> EvalResult {
    match (left.is_temporal(), right.is_temporal()) {
        (true, false) => match right.as_number() {
            Some(days) => shift(left, days),
            None => EvalResult::Error(EvalError::Value),
        },
        (false, true) => match left.as_number() {
            Some(days) => shift(right, days),
            None => EvalResult::Error(EvalError::Value),
        },
        (true, true) => EvalResult::Error(EvalError::Value),
        (false, false) => numeric(left, right, |l, r| Ok(l + r)),
    }
}

fn eval_subtract(left: &EvalResult, right: &EvalResult) -> EvalResult {
    match (left.is_temporal(), right.is_temporal()) {
        (true, true) => match (left, right) {
            (EvalResult::Date(a), EvalResult::Date(b)) => {
                EvalResult::Number((*a - *b).num_days() as f64)
            }
            _ => match (left.as_instant(), right.as_instant()) {
                (Some(a), Some(b)) => EvalResult::Number((a - b).num_seconds() as f64 / 86_400.0),
                _ => EvalResult::Error(EvalError::Value),
            },
        },
        (true, false) => match right.as_number() {
            Some(days) => shift(left, -days),
            None => EvalResult::Error(EvalError::Value),
        },
        (false, true) => EvalResult::Error(EvalError::Value),
        (false, false) => numeric(left, right, |l, r| Ok(l - r)),
    }
}

fn ordered(left: &EvalResult, right: &EvalResult, test: fn(Ordering) -> bool) -> EvalResult {
    match compare(left, right) {
        Some(ordering) => EvalResult::Boolean(test(ordering)),
        None => EvalResult::Error(EvalError::Value),
    }
}

/// Compares two operands. `None` means they are not comparable.
///
/// Text compares case-insensitively. Temporal values compare by instant and
/// accept ISO text on the other side. Empty acts as 0, "" or FALSE depending
/// on the other operand, and sorts before any temporal value.
pub fn compare(left: &EvalResult, right: &EvalResult) -> Option<Ordering> {
    use EvalResult::*;

    match (left, right) {
        (Error(_), _) | (_, Error(_)) => None,
        (Empty, Empty) => Some(Ordering::Equal),
        (Number(l), Number(r)) => l.partial_cmp(r),
        (Boolean(l), Boolean(r)) => Some(l.cmp(r)),
        (Text(l), Text(r)) => Some(l.to_lowercase().cmp(&r.to_lowercase())),
        (l, r) if l.is_temporal() || r.is_temporal() => match (l.as_instant(), r.as_instant()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ if l.is_empty() => Some(Ordering::Less),
            _ if r.is_empty() => Some(Ordering::Greater),
            _ => None,
        },
        (Empty, Text(r)) => Some(String::new().cmp(&r.to_lowercase())),
        (Text(l), Empty) => Some(l.to_lowercase().cmp(&String::new())),
        (Text(_), _) | (_, Text(_)) => match (left.as_number(), right.as_number()) {
            (Some(l), Some(r)) => l.partial_cmp(&r),
            _ => match (left.as_boolean(), right.as_boolean()) {
                (Some(l), Some(r)) if matches!(left, Boolean(_)) || matches!(right, Boolean(_)) => {
                    Some(l.cmp(&r))
                }
                _ => None,
            },
        },
        _ => match (left.as_number(), right.as_number()) {
            (Some(l), Some(r)) => l.partial_cmp(&r),
            _ => None,
        },
    }
}

fn parse_iso_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_iso_instant(text).map(|dt| dt.date()))
}

/// Reads "YYYY-MM-DD", "YYYY-MM-DD HH:MM[:SS]" (or with 'T') and "HH:MM[:SS]".
fn parse_iso_instant(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    const DATETIME_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt);
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(d.and_time(NaiveTime::MIN));
    }
    NaiveTime::parse_from_str(text, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .ok()
        .map(|t| NaiveDate::MIN.and_time(t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::NumberKind;
    use parser::parse;
    use std::collections::HashMap;

    /// A tiny in-memory dataset: rows of alias -> value.
    struct TestRows {
        rows: Vec<HashMap<String, TypedValue>>,
        current_row: usize,
        current: Option<TypedValue>,
    }

    impl TestRows {
        fn people() -> Self {
            let row = |name: &str, age: f64| {
                let mut map = HashMap::new();
                map.insert("Name".to_string(), TypedValue::text(name));
                map.insert("Age".to_string(), TypedValue::number(age));
                map
            };
            TestRows {
                rows: vec![row("Ann", 30.0), row("Bo", 25.0), row("Cy", 41.0)],
                current_row: 0,
                current: None,
            }
        }
    }

    impl EvalContext for TestRows {
        fn column_value(&self, alias: &str) -> Option<&TypedValue> {
            self.rows.get(self.current_row)?.get(alias)
        }

        fn current_value(&self) -> Option<&TypedValue> {
            self.current.as_ref()
        }

        fn dataset_column(&self, alias: &str) -> Option<Vec<&TypedValue>> {
            self.rows.iter().map(|r| r.get(alias)).collect()
        }

        fn row_count(&self) -> usize {
            self.rows.len()
        }

        fn row_index(&self) -> Option<usize> {
            Some(self.current_row)
        }
    }

    fn eval(ctx: &TestRows, source: &str) -> EvalResult {
        let expr = parse(source).unwrap();
        Evaluator::new(ctx).evaluate(&expr)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_arithmetic_precedence() {
        let ctx = TestRows::people();
        assert_eq!(eval(&ctx, "1 + 2 * 3"), EvalResult::Number(7.0));
        assert_eq!(eval(&ctx, "-2 ^ 2"), EvalResult::Number(-4.0));
        assert_eq!(eval(&ctx, "Age / 3"), EvalResult::Number(10.0));
    }

    #[test]
    fn test_division_by_zero() {
        let ctx = TestRows::people();
        assert_eq!(eval(&ctx, "Age / 0"), EvalResult::Error(EvalError::Div0));
        assert_eq!(eval(&ctx, "MOD(5, 0)"), EvalResult::Error(EvalError::Div0));
    }

    #[test]
    fn test_filter_predicate() {
        let mut ctx = TestRows::people();
        assert_eq!(eval(&ctx, "Age > 26 AND Name <> \"Bo\""), EvalResult::Boolean(true));
        ctx.current_row = 1;
        assert_eq!(eval(&ctx, "Age > 26 && Name != 'Bo'"), EvalResult::Boolean(false));
        assert_eq!(eval(&ctx, "NOT (Age > 26)"), EvalResult::Boolean(true));
    }

    #[test]
    fn test_text_comparison_is_case_insensitive() {
        let ctx = TestRows::people();
        assert_eq!(eval(&ctx, "Name = \"ANN\""), EvalResult::Boolean(true));
        assert_eq!(eval(&ctx, "\"apple\" < \"Banana\""), EvalResult::Boolean(true));
    }

    #[test]
    fn test_mismatched_ordering_is_value_error() {
        let ctx = TestRows::people();
        assert_eq!(eval(&ctx, "Name > 3"), EvalResult::Error(EvalError::Value));
        assert_eq!(eval(&ctx, "Name = 3"), EvalResult::Boolean(false));
        assert_eq!(eval(&ctx, "\"30\" = Age"), EvalResult::Boolean(true));
    }

    #[test]
    fn test_unknown_column_is_ref_error() {
        let ctx = TestRows::people();
        assert_eq!(eval(&ctx, "Height * 2"), EvalResult::Error(EvalError::Ref));
        assert_eq!(eval(&ctx, "@"), EvalResult::Error(EvalError::Ref));
    }

    #[test]
    fn test_connectives_short_circuit() {
        let ctx = TestRows::people();
        // The right side would be a #REF! error if it were evaluated
        assert_eq!(eval(&ctx, "FALSE AND Missing > 1"), EvalResult::Boolean(false));
        assert_eq!(eval(&ctx, "TRUE OR Missing > 1"), EvalResult::Boolean(true));
        assert_eq!(eval(&ctx, "TRUE AND Missing > 1"), EvalResult::Error(EvalError::Ref));
    }

    #[test]
    fn test_dataset_aggregates() {
        let ctx = TestRows::people();
        assert_eq!(eval(&ctx, "SUM(Age)"), EvalResult::Number(96.0));
        assert_eq!(eval(&ctx, "AVERAGE(Age)"), EvalResult::Number(32.0));
        assert_eq!(eval(&ctx, "MIN(Age)"), EvalResult::Number(25.0));
        assert_eq!(eval(&ctx, "MAX(Age)"), EvalResult::Number(41.0));
        assert_eq!(eval(&ctx, "COUNT(Name)"), EvalResult::Number(3.0));
        assert_eq!(eval(&ctx, "ROWS()"), EvalResult::Number(3.0));
        assert_eq!(eval(&ctx, "ROWNUM()"), EvalResult::Number(1.0));
    }

    #[test]
    fn test_aggregate_over_arguments() {
        let ctx = TestRows::people();
        assert_eq!(eval(&ctx, "SUM(1, 2, Age)"), EvalResult::Number(33.0));
        assert_eq!(eval(&ctx, "MAX(Age + 1, 2)"), EvalResult::Number(31.0));
        assert_eq!(eval(&ctx, "AVERAGE(\"x\")"), EvalResult::Error(EvalError::Div0));
    }

    #[test]
    fn test_current_value_in_formatter() {
        let mut ctx = TestRows::people();
        ctx.current = Some(TypedValue::Number {
            value: 0.25,
            kind: NumberKind::Percent,
        });
        assert_eq!(eval(&ctx, "@ * 100 & \"%\""), EvalResult::Text("25%".to_string()));
        assert_eq!(
            eval(&ctx, "IF(@ > 0.5, \"high\", \"low\")"),
            EvalResult::Text("low".to_string())
        );
        assert_eq!(
            eval(&ctx, "TEXT(@ * Age, \"0.00\")"),
            EvalResult::Text("7.50".to_string())
        );
    }

    #[test]
    fn test_text_functions() {
        let ctx = TestRows::people();
        assert_eq!(eval(&ctx, "UPPER(Name) & LEN(Name)"), EvalResult::Text("ANN3".to_string()));
        assert_eq!(eval(&ctx, "TRIM(\"  a   b \")"), EvalResult::Text("a b".to_string()));
        assert_eq!(eval(&ctx, "LEFT(\"hello\", 2)"), EvalResult::Text("he".to_string()));
        assert_eq!(eval(&ctx, "RIGHT(\"hello\")"), EvalResult::Text("o".to_string()));
        assert_eq!(eval(&ctx, "MID(\"hello\", 2, 3)"), EvalResult::Text("ell".to_string()));
        assert_eq!(eval(&ctx, "REPT(\"ab\", 3)"), EvalResult::Text("ababab".to_string()));
        assert_eq!(eval(&ctx, "CONTAINS(Name, \"NN\")"), EvalResult::Boolean(true));
        assert_eq!(eval(&ctx, "STARTSWITH(Name, \"b\")"), EvalResult::Boolean(false));
        assert_eq!(eval(&ctx, "CONCAT(Name, \"-\", Age)"), EvalResult::Text("Ann-30".to_string()));
    }

    #[test]
    fn test_rept_is_bounded() {
        let ctx = TestRows::people();
        assert_eq!(eval(&ctx, "REPT(\"x\", 1000000)"), EvalResult::Error(EvalError::Value));
    }

    #[test]
    fn test_math_functions() {
        let ctx = TestRows::people();
        assert_eq!(eval(&ctx, "ROUND(2.346, 2)"), EvalResult::Number(2.35));
        assert_eq!(eval(&ctx, "ROUND(2.5)"), EvalResult::Number(3.0));
        assert_eq!(eval(&ctx, "MOD(-3, 5)"), EvalResult::Number(2.0));
        assert_eq!(eval(&ctx, "INT(-1.5)"), EvalResult::Number(-2.0));
        assert_eq!(eval(&ctx, "SQRT(-1)"), EvalResult::Error(EvalError::Num));
        assert_eq!(eval(&ctx, "POWER(2, 10)"), EvalResult::Number(1024.0));
    }

    #[test]
    fn test_information_functions() {
        let mut ctx = TestRows::people();
        ctx.current = Some(TypedValue::Empty);
        assert_eq!(eval(&ctx, "ISBLANK(@)"), EvalResult::Boolean(true));
        assert_eq!(eval(&ctx, "ISNUMBER(Age)"), EvalResult::Boolean(true));
        assert_eq!(eval(&ctx, "ISTEXT(Age)"), EvalResult::Boolean(false));
    }

    #[test]
    fn test_date_values() {
        let mut ctx = TestRows::people();
        ctx.current = Some(TypedValue::Date {
            value: date(2024, 2, 28),
            format: DateFormat::new("DD.MM.YYYY"),
        });
        assert_eq!(eval(&ctx, "@ + 2"), EvalResult::Date(date(2024, 3, 1)));
        assert_eq!(eval(&ctx, "@ - DATE(2024, 1, 1)"), EvalResult::Number(58.0));
        assert_eq!(eval(&ctx, "@ > \"2024-01-31\""), EvalResult::Boolean(true));
        assert_eq!(eval(&ctx, "YEAR(@) * 100 + MONTH(@)"), EvalResult::Number(202402.0));
        assert_eq!(eval(&ctx, "TEXT(@, \"D MMM\")"), EvalResult::Text("28 Feb".to_string()));
        assert_eq!(eval(&ctx, "DATE(\"2024-05-06\")"), EvalResult::Date(date(2024, 5, 6)));
        assert_eq!(eval(&ctx, "DATE(2024, 2, 30)"), EvalResult::Error(EvalError::Num));
        assert_eq!(eval(&ctx, "DATE(2024, 2)"), EvalResult::Error(EvalError::Value));
    }

    #[test]
    fn test_time_parts() {
        let mut ctx = TestRows::people();
        ctx.current = Some(TypedValue::Time {
            value: NaiveTime::from_hms_opt(14, 35, 0).unwrap(),
            format: DateFormat::new("HH:mm"),
        });
        assert_eq!(eval(&ctx, "HOUR(@)"), EvalResult::Number(14.0));
        assert_eq!(eval(&ctx, "MINUTE(@)"), EvalResult::Number(35.0));
        assert_eq!(eval(&ctx, "@ < \"15:00\""), EvalResult::Boolean(true));
    }

    #[test]
    fn test_empty_coercions() {
        let mut ctx = TestRows::people();
        ctx.current = Some(TypedValue::Empty);
        assert_eq!(eval(&ctx, "@ + 1"), EvalResult::Number(1.0));
        assert_eq!(eval(&ctx, "@ & \"x\""), EvalResult::Text("x".to_string()));
        assert_eq!(eval(&ctx, "@ = \"\""), EvalResult::Boolean(true));
        assert_eq!(eval(&ctx, "NOT @"), EvalResult::Boolean(true));
    }

    #[test]
    fn test_step_limit_stops_evaluation() {
        let ctx = TestRows::people();
        let expr = parse("SUM(Age) + SUM(Age) + SUM(Age)").unwrap();

        let bounded = Evaluator::with_step_limit(&ctx, 5);
        assert_eq!(bounded.evaluate(&expr), EvalResult::Error(EvalError::StepLimit));

        let unbounded = Evaluator::new(&ctx);
        assert_eq!(unbounded.evaluate(&expr), EvalResult::Number(288.0));
        assert!(unbounded.steps_used() > 9);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(EvalError::Div0.to_string(), "#DIV/0!");
        assert_eq!(EvalResult::Error(EvalError::Ref).as_text(), "#REF!");
        assert_eq!(EvalResult::Number(2.5).as_text(), "2.5");
        assert_eq!(EvalResult::Boolean(true).as_text(), "TRUE");
    }
}
