//! Ledger address representation.
//!
//! Addresses are 21 bytes: a one-byte network prefix (`0x41`) followed by the
//! 20-byte account hash shared with Ethereum-style ABI encoding. The canonical
//! text form is base58check, while contract events report addresses as hex.

use alloy::primitives::Address as EvmAddress;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Prefix byte of mainnet (and test network) addresses.
pub const ADDRESS_PREFIX: u8 = 0x41;

const ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
	#[error("Invalid hex address: {0}")]
	InvalidHex(String),
	#[error("Invalid base58 character: {0}")]
	InvalidCharacter(char),
	#[error("Invalid address length: {0}")]
	InvalidLength(usize),
	#[error("Invalid address prefix: {0:#04x}")]
	InvalidPrefix(u8),
	#[error("Checksum mismatch")]
	ChecksumMismatch,
}

/// A 21-byte ledger address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TronAddress(pub [u8; 21]);

impl TronAddress {
	/// Parses the hex form found in event payloads.
	///
	/// Accepts the 20-byte Ethereum form (`0x` + 40 hex chars) as well as the
	/// prefixed 21-byte form (`41` + 40 hex chars).
	pub fn from_hex(value: &str) -> Result<Self, AddressError> {
		let trimmed = value.strip_prefix("0x").unwrap_or(value);
		let bytes =
			hex::decode(trimmed).map_err(|_| AddressError::InvalidHex(value.to_string()))?;

		match bytes.len() {
			20 => {
				let mut out = [0u8; 21];
				out[0] = ADDRESS_PREFIX;
				out[1..].copy_from_slice(&bytes);
				Ok(Self(out))
			}
			21 => Self::from_slice(&bytes),
			len => Err(AddressError::InvalidLength(len)),
		}
	}

	/// Parses the base58check text form (`T...`).
	pub fn from_base58(value: &str) -> Result<Self, AddressError> {
		let decoded = base58_decode(value)?;
		if decoded.len() != 25 {
			return Err(AddressError::InvalidLength(decoded.len()));
		}

		let (payload, checksum) = decoded.split_at(21);
		if checksum != &double_sha256(payload)[..4] {
			return Err(AddressError::ChecksumMismatch);
		}

		Self::from_slice(payload)
	}

	/// Builds an address from the 20-byte account hash.
	pub fn from_evm(address: EvmAddress) -> Self {
		let mut out = [0u8; 21];
		out[0] = ADDRESS_PREFIX;
		out[1..].copy_from_slice(address.as_slice());
		Self(out)
	}

	fn from_slice(bytes: &[u8]) -> Result<Self, AddressError> {
		if bytes.len() != 21 {
			return Err(AddressError::InvalidLength(bytes.len()));
		}
		if bytes[0] != ADDRESS_PREFIX {
			return Err(AddressError::InvalidPrefix(bytes[0]));
		}

		let mut out = [0u8; 21];
		out.copy_from_slice(bytes);
		Ok(Self(out))
	}

	/// The 20-byte account hash used in ABI-encoded call arguments.
	pub fn evm_address(&self) -> EvmAddress {
		EvmAddress::from_slice(&self.0[1..])
	}

	/// Prefixed hex form without `0x` (`41...`).
	pub fn to_hex(&self) -> String {
		hex::encode(self.0)
	}

	pub fn to_base58(&self) -> String {
		let mut payload = Vec::with_capacity(25);
		payload.extend_from_slice(&self.0);
		payload.extend_from_slice(&double_sha256(&self.0)[..4]);
		base58_encode(&payload)
	}
}

impl fmt::Display for TronAddress {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.to_base58())
	}
}

impl FromStr for TronAddress {
	type Err = AddressError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if s.starts_with('T') {
			Self::from_base58(s)
		} else {
			Self::from_hex(s)
		}
	}
}

impl Serialize for TronAddress {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.to_base58())
	}
}

impl<'de> Deserialize<'de> for TronAddress {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let value = String::deserialize(deserializer)?;
		value.parse().map_err(serde::de::Error::custom)
	}
}

fn double_sha256(data: &[u8]) -> [u8; 32] {
	let first = Sha256::digest(data);
	Sha256::digest(first).into()
}

fn base58_encode(input: &[u8]) -> String {
	let zeros = input.iter().take_while(|&&b| b == 0).count();

	// Little-endian base58 digits
	let mut digits: Vec<u8> = Vec::with_capacity(input.len() * 138 / 100 + 1);
	for &byte in &input[zeros..] {
		let mut carry = byte as u32;
		for digit in digits.iter_mut() {
			carry += (*digit as u32) << 8;
			*digit = (carry % 58) as u8;
			carry /= 58;
		}
		while carry > 0 {
			digits.push((carry % 58) as u8);
			carry /= 58;
		}
	}

	let mut out = String::with_capacity(zeros + digits.len());
	out.extend(std::iter::repeat('1').take(zeros));
	out.extend(digits.iter().rev().map(|&d| ALPHABET[d as usize] as char));
	out
}

fn base58_decode(input: &str) -> Result<Vec<u8>, AddressError> {
	let zeros = input.bytes().take_while(|&b| b == b'1').count();

	// Little-endian bytes
	let mut bytes: Vec<u8> = Vec::with_capacity(input.len());
	for ch in input.bytes().skip(zeros) {
		let value = ALPHABET
			.iter()
			.position(|&a| a == ch)
			.ok_or(AddressError::InvalidCharacter(ch as char))?;

		let mut carry = value as u32;
		for byte in bytes.iter_mut() {
			carry += (*byte as u32) * 58;
			*byte = (carry & 0xff) as u8;
			carry >>= 8;
		}
		while carry > 0 {
			bytes.push((carry & 0xff) as u8);
			carry >>= 8;
		}
	}

	let mut out = vec![0u8; zeros];
	out.extend(bytes.iter().rev());
	Ok(out)
}
