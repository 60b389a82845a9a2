//! Built-in function registry with overload resolution
//!
//! Overloads are ranked by total implicit conversion cost of the actual
//! argument types to the declared parameter types; the cheapest wins and
//! ties go to the overload registered first.

use crate::{FunctionKind, FunctionLookupError, FunctionRegistry, ResolvedFunction};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sqlscope_types::{SqlType, TypeCoercer};
use std::fmt;
use std::sync::Arc;

/// A declared parameter type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArgumentType {
    Exact(SqlType),
    /// Accepts any type; binds the type variable `T`
    Any,
}

/// Declared return type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReturnType {
    Fixed(SqlType),
    /// Same type as the argument at this position
    SameAsArgument(usize),
}

/// One overload of a function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub name: String,
    pub kind: FunctionKind,
    pub arguments: Vec<ArgumentType>,
    pub return_type: ReturnType,
}

impl FunctionSignature {
    pub fn new(
        name: impl Into<String>,
        kind: FunctionKind,
        arguments: Vec<ArgumentType>,
        return_type: ReturnType,
    ) -> Self {
        Self {
            name: name.into().to_lowercase(),
            kind,
            arguments,
            return_type,
        }
    }

    pub fn scalar(name: &str, arguments: &[SqlType], return_type: SqlType) -> Self {
        Self::new(
            name,
            FunctionKind::Scalar,
            arguments.iter().copied().map(ArgumentType::Exact).collect(),
            ReturnType::Fixed(return_type),
        )
    }

    pub fn aggregate(name: &str, arguments: &[SqlType], return_type: SqlType) -> Self {
        Self::new(
            name,
            FunctionKind::Aggregate,
            arguments.iter().copied().map(ArgumentType::Exact).collect(),
            ReturnType::Fixed(return_type),
        )
    }

    pub fn window(name: &str, return_type: SqlType) -> Self {
        Self::new(name, FunctionKind::Window, Vec::new(), ReturnType::Fixed(return_type))
    }

    /// Comma-separated parameter types, `T` for [`ArgumentType::Any`]
    pub fn argument_list(&self) -> String {
        self.arguments
            .iter()
            .map(|a| match a {
                ArgumentType::Exact(ty) => ty.name(),
                ArgumentType::Any => "T",
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn return_type_name(&self) -> String {
        match self.return_type {
            ReturnType::Fixed(ty) => ty.name().to_string(),
            ReturnType::SameAsArgument(_) => "T".to_string(),
        }
    }

    /// Total conversion cost for the given argument types, `None` if the
    /// overload does not apply
    fn cost(&self, coercer: &TypeCoercer, actual: &[SqlType]) -> Option<u32> {
        if actual.len() != self.arguments.len() {
            return None;
        }
        self.arguments
            .iter()
            .zip(actual)
            .try_fold(0u32, |total, (declared, actual)| match declared {
                ArgumentType::Any => Some(total),
                ArgumentType::Exact(ty) => Some(total + coercer.conversion_cost(*actual, *ty)?),
            })
    }

    fn bind(&self, actual: &[SqlType]) -> ResolvedFunction {
        let argument_types = self
            .arguments
            .iter()
            .zip(actual)
            .map(|(declared, actual)| match declared {
                ArgumentType::Exact(ty) => *ty,
                ArgumentType::Any => *actual,
            })
            .collect::<Vec<_>>();
        let return_type = match self.return_type {
            ReturnType::Fixed(ty) => ty,
            ReturnType::SameAsArgument(i) => argument_types.get(i).copied().unwrap_or(SqlType::Unknown),
        };
        ResolvedFunction {
            name: self.name.clone(),
            kind: self.kind,
            argument_types,
            return_type,
        }
    }
}

impl fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.argument_list())
    }
}

/// Thread-safe registry of function signatures keyed by lower-cased name
#[derive(Debug, Clone)]
pub struct BuiltinFunctionRegistry {
    functions: Arc<RwLock<IndexMap<String, Vec<FunctionSignature>>>>,
    coercer: TypeCoercer,
}

impl Default for BuiltinFunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BuiltinFunctionRegistry {
    /// Registry with the built-in functions
    pub fn new() -> Self {
        let registry = Self::empty();
        for signature in builtin_signatures() {
            registry.register(signature);
        }
        registry
    }

    pub fn empty() -> Self {
        Self {
            functions: Arc::new(RwLock::new(IndexMap::new())),
            coercer: TypeCoercer::new(),
        }
    }

    pub fn register(&self, signature: FunctionSignature) {
        self.functions
            .write()
            .entry(signature.name.clone())
            .or_default()
            .push(signature);
    }
}

fn builtin_signatures() -> Vec<FunctionSignature> {
    use SqlType::{BigInt, Double, Integer, Varchar};

    let mut signatures = vec![
        FunctionSignature::aggregate("count", &[], BigInt),
        FunctionSignature::new(
            "count",
            FunctionKind::Aggregate,
            vec![ArgumentType::Any],
            ReturnType::Fixed(BigInt),
        ),
        FunctionSignature::aggregate("sum", &[Integer], BigInt),
        FunctionSignature::aggregate("sum", &[BigInt], BigInt),
        FunctionSignature::aggregate("sum", &[Double], Double),
        FunctionSignature::aggregate("avg", &[Integer], Double),
        FunctionSignature::aggregate("avg", &[BigInt], Double),
        FunctionSignature::aggregate("avg", &[Double], Double),
    ];
    for name in ["min", "max"] {
        signatures.push(FunctionSignature::new(
            name,
            FunctionKind::Aggregate,
            vec![ArgumentType::Any],
            ReturnType::SameAsArgument(0),
        ));
    }
    for name in ["row_number", "rank", "dense_rank"] {
        signatures.push(FunctionSignature::window(name, BigInt));
    }
    signatures.extend([
        FunctionSignature::scalar("lower", &[Varchar], Varchar),
        FunctionSignature::scalar("upper", &[Varchar], Varchar),
        FunctionSignature::scalar("length", &[Varchar], BigInt),
        FunctionSignature::scalar("abs", &[Integer], Integer),
        FunctionSignature::scalar("abs", &[BigInt], BigInt),
        FunctionSignature::scalar("abs", &[Double], Double),
    ]);
    signatures
}

impl FunctionRegistry for BuiltinFunctionRegistry {
    fn resolve_function(
        &self,
        name: &str,
        argument_types: &[SqlType],
    ) -> Result<ResolvedFunction, FunctionLookupError> {
        let name = name.to_lowercase();
        let functions = self.functions.read();
        let overloads = functions
            .get(&name)
            .ok_or_else(|| FunctionLookupError::NotFound(name.clone()))?;

        let best = overloads
            .iter()
            .filter_map(|sig| sig.cost(&self.coercer, argument_types).map(|cost| (cost, sig)))
            .min_by_key(|(cost, _)| *cost);

        match best {
            Some((_, signature)) => Ok(signature.bind(argument_types)),
            None => Err(FunctionLookupError::NoMatchingSignature {
                name: name.clone(),
                actual: argument_types
                    .iter()
                    .map(|t| t.name())
                    .collect::<Vec<_>>()
                    .join(", "),
                expected: overloads
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }

    fn function_kind(&self, name: &str) -> Option<FunctionKind> {
        self.functions
            .read()
            .get(&name.to_lowercase())
            .and_then(|overloads| overloads.first())
            .map(|sig| sig.kind)
    }

    fn list_functions(&self) -> Vec<FunctionSignature> {
        let mut all: Vec<FunctionSignature> =
            self.functions.read().values().flatten().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("sum", vec![SqlType::Integer], SqlType::BigInt)]
    #[case("sum", vec![SqlType::Double], SqlType::Double)]
    #[case("avg", vec![SqlType::BigInt], SqlType::Double)]
    #[case("max", vec![SqlType::Varchar], SqlType::Varchar)]
    #[case("count", vec![], SqlType::BigInt)]
    #[case("count", vec![SqlType::Date], SqlType::BigInt)]
    #[case("abs", vec![SqlType::Integer], SqlType::Integer)]
    #[case("ABS", vec![SqlType::BigInt], SqlType::BigInt)]
    fn test_resolve_return_type(
        #[case] name: &str,
        #[case] args: Vec<SqlType>,
        #[case] expected: SqlType,
    ) {
        let registry = BuiltinFunctionRegistry::new();
        let resolved = registry.resolve_function(name, &args).unwrap();
        assert_eq!(resolved.return_type, expected);
    }

    #[test]
    fn test_cheapest_overload_wins() {
        let registry = BuiltinFunctionRegistry::empty();
        registry.register(FunctionSignature::scalar("f", &[SqlType::Double], SqlType::Double));
        registry.register(FunctionSignature::scalar("f", &[SqlType::BigInt], SqlType::BigInt));

        // integer -> bigint (1) beats integer -> double (2)
        let resolved = registry.resolve_function("f", &[SqlType::Integer]).unwrap();
        assert_eq!(resolved.argument_types, vec![SqlType::BigInt]);
    }

    #[test]
    fn test_no_matching_signature() {
        let registry = BuiltinFunctionRegistry::new();
        let err = registry
            .resolve_function("sum", &[SqlType::Varchar])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unexpected parameters (varchar) for function sum. \
             Expected: sum(integer), sum(bigint), sum(double)"
        );
    }

    #[test]
    fn test_unknown_function() {
        let registry = BuiltinFunctionRegistry::new();
        assert_eq!(
            registry.resolve_function("nope", &[]),
            Err(FunctionLookupError::NotFound("nope".to_string()))
        );
    }

    #[test]
    fn test_function_kinds() {
        let registry = BuiltinFunctionRegistry::new();
        assert!(registry.is_aggregate("COUNT"));
        assert!(registry.is_window("rank"));
        assert!(!registry.is_aggregate("lower"));
        assert_eq!(registry.function_kind("missing"), None);
    }

    #[test]
    fn test_list_functions_is_sorted() {
        let registry = BuiltinFunctionRegistry::new();
        let names: Vec<String> = registry.list_functions().into_iter().map(|f| f.name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert!(names.contains(&"row_number".to_string()));
    }
}
