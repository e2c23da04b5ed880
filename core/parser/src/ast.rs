//! FILENAME: core/parser/src/ast.rs
//! PURPOSE: Defines the Abstract Syntax Tree (AST) for filter and formatter expressions.
//! CONTEXT: After the Lexer tokenizes an expression string, the Parser converts
//! those tokens into this tree structure. The engine's Evaluator then traverses
//! this tree against a row and its dataset.
//!
//! SUPPORTED EXPRESSIONS:
//! - Literals: Numbers, Strings, Booleans
//! - Column references: Age, [Unit Price]
//! - The formatted cell's own value: @
//! - Binary operations: +, -, *, /, ^, &, =, <>, <, >, <=, >=, AND, OR
//! - Unary operations: - (negation), NOT
//! - Calls to the allow-listed builtin functions

/// Represents a parsed expression.
#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    /// A literal value: number, string, or boolean.
    Literal(Value),

    /// A reference to a column of the current row, by alias.
    Column(String),

    /// The typed value of the cell being formatted (`@`).
    CurrentValue,

    /// A binary operation: left op right (e.g., 5 + 3, Age > 10).
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },

    /// A unary operation: op operand (e.g., -5, NOT Done).
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expression>,
    },

    /// A call to a builtin function, resolved at parse time.
    FunctionCall {
        func: BuiltinFunction,
        args: Vec<Expression>,
    },
}

impl Expression {
    /// Collects every column alias referenced by this expression, in
    /// first-seen order and without duplicates.
    pub fn referenced_columns(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_columns(&mut names);
        names
    }

    fn collect_columns<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Expression::Column(name) => {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
            Expression::BinaryOp { left, right, .. } => {
                left.collect_columns(names);
                right.collect_columns(names);
            }
            Expression::UnaryOp { operand, .. } => operand.collect_columns(names),
            Expression::FunctionCall { args, .. } => {
                for arg in args {
                    arg.collect_columns(names);
                }
            }
            Expression::Literal(_) | Expression::CurrentValue => {}
        }
    }

    /// Returns true if the expression reads the formatted cell's own value.
    pub fn uses_current_value(&self) -> bool {
        match self {
            Expression::CurrentValue => true,
            Expression::BinaryOp { left, right, .. } => {
                left.uses_current_value() || right.uses_current_value()
            }
            Expression::UnaryOp { operand, .. } => operand.uses_current_value(),
            Expression::FunctionCall { args, .. } => args.iter().any(|a| a.uses_current_value()),
            Expression::Literal(_) | Expression::Column(_) => false,
        }
    }
}

/// Literal values that can appear in expressions.
#[derive(Debug, PartialEq, Clone)]
pub enum Value {
    Number(f64),
    String(String),
    Boolean(bool),
}

/// Binary operators for expressions.
/// Listed in order of precedence groups (OR is lowest).
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum BinaryOperator {
    // Boolean connectives (lowest precedence)
    Or,  // OR, ||
    And, // AND, &&

    // Comparison operators
    Equal,        // =, ==
    NotEqual,     // <>, !=
    LessThan,     // <
    GreaterThan,  // >
    LessEqual,    // <=
    GreaterEqual, // >=

    // String concatenation
    Concat, // &

    // Arithmetic operators
    Add,      // +
    Subtract, // -
    Multiply, // *
    Divide,   // /
    Power,    // ^ (highest precedence among binary ops)
}

/// Unary operators.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum UnaryOperator {
    Negate, // -
    Not,    // NOT, !
}

/// Builtin functions resolved at parse time.
/// Anything outside this list is rejected by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinFunction {
    // Aggregate functions (over arguments, or over a dataset column)
    Sum,
    Average,
    Min,
    Max,
    Count,

    // Dataset functions
    Rows,
    RowNum,

    // Logical functions
    If,
    And,
    Or,

    // Math functions
    Abs,
    Round,
    Floor,
    Ceiling,
    Sqrt,
    Power,
    Mod,
    Int,

    // Text functions
    Len,
    Upper,
    Lower,
    Trim,
    Concat,
    Left,
    Right,
    Mid,
    Rept,
    Text,
    Contains,
    StartsWith,
    EndsWith,

    // Information functions
    IsBlank,
    IsNumber,
    IsText,

    // Date functions
    Date,
    Year,
    Month,
    Day,
    Hour,
    Minute,
}

impl BuiltinFunction {
    /// Resolves a function name (case-insensitive) to a builtin.
    pub fn from_name(name: &str) -> Option<Self> {
        let func = match name.to_uppercase().as_str() {
            "SUM" => BuiltinFunction::Sum,
            "AVERAGE" | "AVG" => BuiltinFunction::Average,
            "MIN" => BuiltinFunction::Min,
            "MAX" => BuiltinFunction::Max,
            "COUNT" => BuiltinFunction::Count,
            "ROWS" => BuiltinFunction::Rows,
            "ROWNUM" => BuiltinFunction::RowNum,
            "IF" => BuiltinFunction::If,
            "AND" => BuiltinFunction::And,
            "OR" => BuiltinFunction::Or,
            "ABS" => BuiltinFunction::Abs,
            "ROUND" => BuiltinFunction::Round,
            "FLOOR" => BuiltinFunction::Floor,
            "CEILING" | "CEIL" => BuiltinFunction::Ceiling,
            "SQRT" => BuiltinFunction::Sqrt,
            "POWER" | "POW" => BuiltinFunction::Power,
            "MOD" => BuiltinFunction::Mod,
            "INT" => BuiltinFunction::Int,
            "LEN" => BuiltinFunction::Len,
            "UPPER" => BuiltinFunction::Upper,
            "LOWER" => BuiltinFunction::Lower,
            "TRIM" => BuiltinFunction::Trim,
            "CONCAT" | "CONCATENATE" => BuiltinFunction::Concat,
            "LEFT" => BuiltinFunction::Left,
            "RIGHT" => BuiltinFunction::Right,
            "MID" => BuiltinFunction::Mid,
            "REPT" => BuiltinFunction::Rept,
            "TEXT" => BuiltinFunction::Text,
            "CONTAINS" => BuiltinFunction::Contains,
            "STARTSWITH" => BuiltinFunction::StartsWith,
            "ENDSWITH" => BuiltinFunction::EndsWith,
            "ISBLANK" => BuiltinFunction::IsBlank,
            "ISNUMBER" => BuiltinFunction::IsNumber,
            "ISTEXT" => BuiltinFunction::IsText,
            "DATE" => BuiltinFunction::Date,
            "YEAR" => BuiltinFunction::Year,
            "MONTH" => BuiltinFunction::Month,
            "DAY" => BuiltinFunction::Day,
            "HOUR" => BuiltinFunction::Hour,
            "MINUTE" => BuiltinFunction::Minute,
            _ => return None,
        };
        Some(func)
    }

    /// Canonical upper-case name.
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinFunction::Sum => "SUM",
            BuiltinFunction::Average => "AVERAGE",
            BuiltinFunction::Min => "MIN",
            BuiltinFunction::Max => "MAX",
            BuiltinFunction::Count => "COUNT",
            BuiltinFunction::Rows => "ROWS",
            BuiltinFunction::RowNum => "ROWNUM",
            BuiltinFunction::If => "IF",
            BuiltinFunction::And => "AND",
            BuiltinFunction::Or => "OR",
            BuiltinFunction::Abs => "ABS",
            BuiltinFunction::Round => "ROUND",
            BuiltinFunction::Floor => "FLOOR",
            BuiltinFunction::Ceiling => "CEILING",
            BuiltinFunction::Sqrt => "SQRT",
            BuiltinFunction::Power => "POWER",
            BuiltinFunction::Mod => "MOD",
            BuiltinFunction::Int => "INT",
            BuiltinFunction::Len => "LEN",
            BuiltinFunction::Upper => "UPPER",
            BuiltinFunction::Lower => "LOWER",
            BuiltinFunction::Trim => "TRIM",
            BuiltinFunction::Concat => "CONCAT",
            BuiltinFunction::Left => "LEFT",
            BuiltinFunction::Right => "RIGHT",
            BuiltinFunction::Mid => "MID",
            BuiltinFunction::Rept => "REPT",
            BuiltinFunction::Text => "TEXT",
            BuiltinFunction::Contains => "CONTAINS",
            BuiltinFunction::StartsWith => "STARTSWITH",
            BuiltinFunction::EndsWith => "ENDSWITH",
            BuiltinFunction::IsBlank => "ISBLANK",
            BuiltinFunction::IsNumber => "ISNUMBER",
            BuiltinFunction::IsText => "ISTEXT",
            BuiltinFunction::Date => "DATE",
            BuiltinFunction::Year => "YEAR",
            BuiltinFunction::Month => "MONTH",
            BuiltinFunction::Day => "DAY",
            BuiltinFunction::Hour => "HOUR",
            BuiltinFunction::Minute => "MINUTE",
        }
    }

    /// Accepted argument count as (min, max). `None` means unbounded.
    pub fn arity(&self) -> (usize, Option<usize>) {
        match self {
            BuiltinFunction::Sum
            | BuiltinFunction::Average
            | BuiltinFunction::Min
            | BuiltinFunction::Max
            | BuiltinFunction::Count
            | BuiltinFunction::And
            | BuiltinFunction::Or
            | BuiltinFunction::Concat => (1, None),
            BuiltinFunction::Rows | BuiltinFunction::RowNum => (0, Some(0)),
            BuiltinFunction::If => (2, Some(3)),
            BuiltinFunction::Round | BuiltinFunction::Left | BuiltinFunction::Right => {
                (1, Some(2))
            }
            BuiltinFunction::Power
            | BuiltinFunction::Mod
            | BuiltinFunction::Rept
            | BuiltinFunction::Text
            | BuiltinFunction::Contains
            | BuiltinFunction::StartsWith
            | BuiltinFunction::EndsWith => (2, Some(2)),
            BuiltinFunction::Mid => (3, Some(3)),
            BuiltinFunction::Date => (1, Some(3)),
            BuiltinFunction::Abs
            | BuiltinFunction::Floor
            | BuiltinFunction::Ceiling
            | BuiltinFunction::Sqrt
            | BuiltinFunction::Int
            | BuiltinFunction::Len
            | BuiltinFunction::Upper
            | BuiltinFunction::Lower
            | BuiltinFunction::Trim
            | BuiltinFunction::IsBlank
            | BuiltinFunction::IsNumber
            | BuiltinFunction::IsText
            | BuiltinFunction::Year
            | BuiltinFunction::Month
            | BuiltinFunction::Day
            | BuiltinFunction::Hour
            | BuiltinFunction::Minute => (1, Some(1)),
        }
    }

    /// True for functions that aggregate a bare column argument over the dataset.
    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            BuiltinFunction::Sum
                | BuiltinFunction::Average
                | BuiltinFunction::Min
                | BuiltinFunction::Max
                | BuiltinFunction::Count
        )
    }
}

impl std::fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinaryOperator::Or => write!(f, "OR"),
            BinaryOperator::And => write!(f, "AND"),
            BinaryOperator::Add => write!(f, "+"),
            BinaryOperator::Subtract => write!(f, "-"),
            BinaryOperator::Multiply => write!(f, "*"),
            BinaryOperator::Divide => write!(f, "/"),
            BinaryOperator::Power => write!(f, "^"),
            BinaryOperator::Concat => write!(f, "&"),
            BinaryOperator::Equal => write!(f, "="),
            BinaryOperator::NotEqual => write!(f, "<>"),
            BinaryOperator::LessThan => write!(f, "<"),
            BinaryOperator::GreaterThan => write!(f, ">"),
            BinaryOperator::LessEqual => write!(f, "<="),
            BinaryOperator::GreaterEqual => write!(f, ">="),
        }
    }
}

impl std::fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOperator::Negate => write!(f, "-"),
            UnaryOperator::Not => write!(f, "NOT"),
        }
    }
}

impl std::fmt::Display for BuiltinFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
        }
    }
}
