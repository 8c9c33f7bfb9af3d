//! Contract call encoding driven by a declarative function table.
//!
//! # Data Flow
//! ```text
//! &[FunctionDef] (names + solidity type strings)
//!     → CallCodec::new (parse types, reject duplicates, derive selectors)
//!     → encode(name, args)         → selector ++ abi(args)
//!     → decode(name, return bytes) → Vec<DynSolValue>
//! ```
//!
//! The table is validated once at construction; a codec that exists is
//! internally consistent.

use alloy::dyn_abi::{DynSolType, DynSolValue};
use alloy::primitives::{keccak256, Bytes, Selector};
use std::collections::HashMap;

use crate::blockchain::types::{BlockchainError, BlockchainResult};

/// One contract function as declared in the interface table.
#[derive(Debug, Clone, Copy)]
pub struct FunctionDef {
    pub name: &'static str,
    pub inputs: &'static [&'static str],
    pub outputs: &'static [&'static str],
}

/// A parsed function entry.
#[derive(Debug, Clone)]
struct Function {
    signature: String,
    selector: Selector,
    inputs: Vec<DynSolType>,
    outputs: Vec<DynSolType>,
}

/// Encoder/decoder for a fixed contract interface.
#[derive(Debug, Clone)]
pub struct CallCodec {
    functions: HashMap<&'static str, Function>,
}

impl CallCodec {
    /// Build a codec, validating the table's self-consistency.
    pub fn new(table: &[FunctionDef]) -> BlockchainResult<Self> {
        let mut functions = HashMap::with_capacity(table.len());
        let mut selectors: HashMap<Selector, &'static str> = HashMap::new();

        for def in table {
            if def.name.is_empty() {
                return Err(BlockchainError::Schema("function with empty name".into()));
            }
            let inputs = parse_types(def.name, def.inputs)?;
            let outputs = parse_types(def.name, def.outputs)?;

            let params: Vec<String> = inputs.iter().map(|t| t.sol_type_name().into_owned()).collect();
            let signature = format!("{}({})", def.name, params.join(","));
            let selector = Selector::from_slice(&keccak256(signature.as_bytes())[..4]);

            if let Some(other) = selectors.insert(selector, def.name) {
                return Err(BlockchainError::Schema(format!(
                    "selector collision between '{}' and '{}'",
                    other, def.name
                )));
            }

            let function = Function {
                signature,
                selector,
                inputs,
                outputs,
            };
            if functions.insert(def.name, function).is_some() {
                return Err(BlockchainError::Schema(format!(
                    "duplicate function '{}'",
                    def.name
                )));
            }
        }

        Ok(Self { functions })
    }

    /// Canonical signature, e.g. `getContent(uint256)`.
    pub fn signature(&self, name: &str) -> BlockchainResult<&str> {
        Ok(self.function(name)?.signature.as_str())
    }

    /// 4-byte function selector.
    pub fn selector(&self, name: &str) -> BlockchainResult<Selector> {
        Ok(self.function(name)?.selector)
    }

    /// Encode a call: selector followed by the ABI-encoded arguments.
    pub fn encode(&self, name: &str, args: &[DynSolValue]) -> BlockchainResult<Bytes> {
        let function = self.function(name)?;
        check_values(name, "argument", &function.inputs, args)?;

        let encoded = DynSolValue::Tuple(args.to_vec()).abi_encode_params();
        let mut data = Vec::with_capacity(4 + encoded.len());
        data.extend_from_slice(function.selector.as_slice());
        data.extend_from_slice(&encoded);
        Ok(data.into())
    }

    /// Decode a call's return data into typed values.
    pub fn decode(&self, name: &str, data: &[u8]) -> BlockchainResult<Vec<DynSolValue>> {
        let function = self.function(name)?;
        decode_params(name, &function.outputs, data)
    }

    /// Encode return values, the inverse of [`CallCodec::decode`].
    pub fn encode_output(&self, name: &str, values: &[DynSolValue]) -> BlockchainResult<Bytes> {
        let function = self.function(name)?;
        check_values(name, "return value", &function.outputs, values)?;
        Ok(DynSolValue::Tuple(values.to_vec()).abi_encode_params().into())
    }

    /// Decode call data (selector included) back into its arguments.
    pub fn decode_call(&self, name: &str, data: &[u8]) -> BlockchainResult<Vec<DynSolValue>> {
        let function = self.function(name)?;
        if data.len() < 4 || data[..4] != function.selector[..] {
            return Err(BlockchainError::Schema(format!(
                "call data does not start with the selector of '{}'",
                name
            )));
        }
        decode_params(name, &function.inputs, &data[4..])
    }

    /// Name of the function a piece of call data targets, if known.
    pub fn function_for(&self, data: &[u8]) -> Option<&'static str> {
        let selector = data.get(..4)?;
        self.functions
            .iter()
            .find(|(_, f)| f.selector[..] == *selector)
            .map(|(name, _)| *name)
    }

    fn function(&self, name: &str) -> BlockchainResult<&Function> {
        self.functions
            .get(name)
            .ok_or_else(|| BlockchainError::Schema(format!("unknown function '{}'", name)))
    }
}

fn parse_types(function: &str, types: &[&str]) -> BlockchainResult<Vec<DynSolType>> {
    types
        .iter()
        .map(|ty| {
            DynSolType::parse(ty).map_err(|e| {
                BlockchainError::Schema(format!("'{}' declares unknown type '{}': {}", function, ty, e))
            })
        })
        .collect()
}

fn check_values(
    function: &str,
    what: &str,
    types: &[DynSolType],
    values: &[DynSolValue],
) -> BlockchainResult<()> {
    if types.len() != values.len() {
        return Err(BlockchainError::Schema(format!(
            "'{}' takes {} {}(s), got {}",
            function,
            types.len(),
            what,
            values.len()
        )));
    }
    for (i, (ty, value)) in types.iter().zip(values).enumerate() {
        if !value.matches(ty) {
            return Err(BlockchainError::Schema(format!(
                "'{}' {} {} must be {}",
                function,
                what,
                i,
                ty.sol_type_name()
            )));
        }
    }
    Ok(())
}

fn decode_params(function: &str, types: &[DynSolType], data: &[u8]) -> BlockchainResult<Vec<DynSolValue>> {
    let decoded = DynSolType::Tuple(types.to_vec())
        .abi_decode_params(data)
        .map_err(|e| BlockchainError::Schema(format!("malformed data for '{}': {}", function, e)))?;

    match decoded {
        DynSolValue::Tuple(values) => Ok(values),
        other => Ok(vec![other]),
    }
}
