use super::*;

use snafu::{ResultExt, Snafu};

// Context selector for the hex integer wire types.
pub(crate) use error::ParseHexIntSnafu;

mod authorize;
mod error;
mod extranonce;
mod merkle;
mod message;
mod nbits;
mod nonce;
mod notify;
mod ntime;
mod prevhash;
mod set_difficulty;
mod submit;
mod subscribe;
mod version;
mod work_id;

pub use {
    authorize::Authorize,
    error::{InternalError, JsonRpcError, StratumError},
    extranonce::Extranonce,
    merkle::{MerkleNode, merkle_branches, merkle_root},
    message::{Id, Message},
    nbits::Nbits,
    nonce::Nonce,
    notify::Notify,
    ntime::Ntime,
    prevhash::PrevHash,
    set_difficulty::SetDifficulty,
    submit::Submit,
    subscribe::{Subscribe, SubscribeResult},
    version::Version,
    work_id::WorkId,
};
