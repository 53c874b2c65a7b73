//! Contract call encoding for fulfillment transactions.

use alloy::sol;
use alloy::sol_types::SolCall;
use oracle_types::FulfillmentCall;

sol! {
	function fulfillOracleRequest(
		bytes32 requestId,
		uint256 payment,
		address callbackAddress,
		bytes4 callbackFunctionId,
		uint256 expiration,
		bytes32 data
	) external returns (bool);

	function fulfillRandomnessRequest(bytes proof) external;
}

/// A contract call split the way the full node's trigger endpoint takes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCall {
	/// Canonical signature, e.g. `fulfillRandomnessRequest(bytes)`.
	pub function_selector: &'static str,
	/// Hex of the ABI-encoded arguments without the 4-byte selector.
	pub parameter: String,
}

pub fn encode_call(call: &FulfillmentCall) -> EncodedCall {
	match call {
		FulfillmentCall::Oracle(args) => encode(fulfillOracleRequestCall {
			requestId: args.request_id,
			payment: args.payment,
			callbackAddress: args.callback_address.evm_address(),
			callbackFunctionId: args.callback_function_id,
			expiration: args.expiration,
			data: args.data,
		}),
		FulfillmentCall::Vrf { proof } => encode(fulfillRandomnessRequestCall {
			proof: proof.clone(),
		}),
	}
}

fn encode<C: SolCall>(call: C) -> EncodedCall {
	let calldata = call.abi_encode();
	EncodedCall {
		function_selector: C::SIGNATURE,
		parameter: hex::encode(&calldata[4..]),
	}
}
