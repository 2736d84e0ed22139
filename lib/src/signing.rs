use std::borrow::Cow;

use alloy_primitives::{address, Address, B256, U256};
use alloy_sol_types::{sol, Eip712Domain, SolStruct};

pub const PERMIT3_DOMAIN_NAME: &str = "Permit3";
pub const PERMIT3_DOMAIN_VERSION: &str = "1";

/// Deployment address of the Permit3 verifier, identical on every supported chain.
pub const PERMIT3_ADDRESS: Address = address!("FB63C771dd42F5f8C949c69Cddb15aFe585D6889");

sol! {
    /// The message an owner signs once to authorize permits on every chain of the batch.
    #[derive(Debug, PartialEq, Eq)]
    struct SignedUnhingedPermit3 {
        address owner;
        bytes32 salt;
        uint256 deadline;
        uint48 timestamp;
        bytes32 unhingedRoot;
    }
}

pub fn permit3_domain(chain_id: u64, verifying_contract: Address) -> Eip712Domain {
    Eip712Domain::new(
        Some(Cow::Borrowed(PERMIT3_DOMAIN_NAME)),
        Some(Cow::Borrowed(PERMIT3_DOMAIN_VERSION)),
        Some(U256::from(chain_id)),
        Some(verifying_contract),
        None,
    )
}

/// EIP-712 digest handed to the signer.
pub fn signing_hash(message: &SignedUnhingedPermit3, domain: &Eip712Domain) -> B256 {
    message.eip712_signing_hash(domain)
}
