//! Interface of the on-chain content registry contract.

use crate::blockchain::codec::{CallCodec, FunctionDef};
use crate::blockchain::types::BlockchainResult;

pub const STORE_CONTENT: &str = "storeContent";
pub const GET_USER_CONTENT_IDS: &str = "getUserContentIds";
pub const GET_CONTENT: &str = "getContent";

/// Field layout of the record returned by `getContent`.
pub const CONTENT_TUPLE: &str = "(uint256,string,string,string,address,uint256,bool,uint256,string,uint256,uint256,string,uint256,uint256,string,bool)";

pub const CONTENT_REGISTRY_ABI: &[FunctionDef] = &[
    FunctionDef {
        name: STORE_CONTENT,
        // ipfsHash, prompt, style, model, width, height, seed, cfgScale, steps, contentHash
        inputs: &[
            "string", "string", "string", "string", "uint256", "uint256", "string", "uint256",
            "uint256", "string",
        ],
        outputs: &["uint256"],
    },
    FunctionDef {
        name: GET_USER_CONTENT_IDS,
        inputs: &["address"],
        outputs: &["uint256[]"],
    },
    FunctionDef {
        name: GET_CONTENT,
        inputs: &["uint256"],
        outputs: &[CONTENT_TUPLE],
    },
];

/// Codec for the registry contract.
pub fn registry_codec() -> BlockchainResult<CallCodec> {
    CallCodec::new(CONTENT_REGISTRY_ABI)
}
