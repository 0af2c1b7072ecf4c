//! Turns raw proposal transactions into readable calls.
//!
//! ABI decoding itself is `ethabi`'s. This module picks the ABI, checks the
//! result is complete and labels the addresses it contains.
use std::collections::{BTreeSet, HashMap};

use anyhow::Result;
use futures::{stream, StreamExt, TryStreamExt};
use log::debug;
use web3::{
    ethabi::{Function, Token},
    types::{Address, U256},
};

use crate::{
    abi::{function_by_selector, AbiTable},
    annotate::{Annotator, KnownContracts},
    cache::Cache,
    client::GovernanceClient,
    data::{AddressAnnotation, ParamName, ParamValue, RawTransaction, Transaction},
    error::ReportError,
    parsing::{as_checksummed, parse_address},
    types::{Mode, MAX_IN_FLIGHT},
};

/// Function name shown for calls without calldata.
const VALUE_TRANSFER: &str = "receive";

pub struct Decoder<'a> {
    abis: &'a AbiTable,
    cache: &'a Cache,
    known: &'a KnownContracts,
    annotator: Annotator<'a>,
}

impl<'a> Decoder<'a> {
    pub fn new(
        abis: &'a AbiTable,
        cache: &'a Cache,
        known: &'a KnownContracts,
        client: &'a dyn GovernanceClient,
    ) -> Self {
        Decoder {
            abis,
            cache,
            known,
            annotator: Annotator::new(known, client),
        }
    }

    /// Decodes all transactions, at most `MAX_IN_FLIGHT` at a time, keeping their order.
    pub async fn decode_all(&self, raw: &[RawTransaction]) -> Result<Vec<Transaction>> {
        stream::iter(raw.iter().enumerate())
            .map(|(index, tx)| self.decode(index, tx))
            .buffered(MAX_IN_FLIGHT)
            .try_collect()
            .await
    }

    /// Name the target is known by.
    fn contract_name(&self, destination: &Address) -> String {
        match self.known.name_of(destination) {
            Some(name) => name.to_owned(),
            None => as_checksummed(destination),
        }
    }

    /// Embedded ABI and proxy functions first, then whatever was fetched for the destination.
    fn function_for(&self, destination: &Address, selector: [u8; 4]) -> Option<&'a Function> {
        offline_function(self.abis, self.known, destination, selector).or_else(|| {
            self.cache
                .abi(destination)
                .and_then(|abi| function_by_selector(abi, selector))
        })
    }

    pub async fn decode(&self, index: usize, raw: &RawTransaction) -> Result<Transaction> {
        let contract = self.contract_name(&raw.destination);
        let decode_error = |reason: String| ReportError::Decode {
            index,
            destination: contract.clone(),
            reason,
        };

        if raw.data.is_empty() {
            return Ok(Transaction {
                contract: contract.clone(),
                function: VALUE_TRANSFER.to_owned(),
                params: vec![],
                value: raw.value,
            });
        }
        if raw.data.len() < 4 {
            return Err(decode_error(format!("{} bytes of calldata", raw.data.len())).into());
        }

        let selector = raw.selector();
        let function = self
            .function_for(&raw.destination, selector)
            .ok_or_else(|| {
                decode_error(format!(
                    "no function with selector 0x{}",
                    hex::encode(selector)
                ))
            })?;

        let tokens = function
            .decode_input(&raw.data[4..])
            .map_err(|e| decode_error(format!("{} ({})", function.name, e)))?;
        check_param_count(index, function, &tokens)?;

        let labels = self.annotate_tokens(&tokens).await?;
        let params = function
            .inputs
            .iter()
            .zip(tokens)
            .enumerate()
            .map(|(i, (input, token))| {
                let name = if input.name.is_empty() {
                    ParamName::Index(i)
                } else {
                    ParamName::Named(input.name.to_owned())
                };
                (name, to_value(token, &labels))
            })
            .collect();
        debug!("Decoded transaction {} as {}.{}", index, contract, function.name);

        Ok(Transaction {
            contract,
            function: function.name.to_owned(),
            params,
            value: raw.value,
        })
    }

    /// Annotates each distinct address in the arguments once.
    async fn annotate_tokens(
        &self,
        tokens: &[Token],
    ) -> Result<HashMap<Address, AddressAnnotation>> {
        let mut addresses = BTreeSet::new();
        for token in tokens {
            collect_addresses(token, &mut addresses);
        }
        let mut labels = HashMap::new();
        for address in addresses {
            let label = self.annotator.annotate(&as_checksummed(&address)).await?;
            labels.insert(address, label);
        }
        Ok(labels)
    }
}

/// A function from the embedded ABI of a core contract, or from the proxy ABI.
fn offline_function<'t>(
    abis: &'t AbiTable,
    known: &KnownContracts,
    destination: &Address,
    selector: [u8; 4],
) -> Option<&'t Function> {
    known
        .name_of(destination)
        .and_then(|name| abis.get(name))
        .and_then(|abi| function_by_selector(abi, selector))
        .or_else(|| function_by_selector(abis.proxy(), selector))
}

/// Destinations with a call the embedded ABIs cannot decode.
fn needs_lookup(
    raw: &[RawTransaction],
    abis: &AbiTable,
    known: &KnownContracts,
) -> BTreeSet<Address> {
    raw.iter()
        .filter(|tx| tx.data.len() >= 4)
        .filter(|tx| offline_function(abis, known, &tx.destination, tx.selector()).is_none())
        .map(|tx| tx.destination)
        .collect()
}

/// Fetches ABIs for calls the embedded ABIs cannot decode, ahead of decoding.
pub async fn prefetch_abis(
    raw: &[RawTransaction],
    abis: &AbiTable,
    known: &KnownContracts,
    cache: &mut Cache,
    mode: &Mode,
    client: &dyn GovernanceClient,
) {
    for destination in needs_lookup(raw, abis, known) {
        cache.try_abi(&destination, mode, client).await;
    }
}

/// Decoded argument count must match the ABI, or names and values would be paired wrongly.
pub fn check_param_count(
    index: usize,
    function: &Function,
    tokens: &[Token],
) -> Result<(), ReportError> {
    if function.inputs.len() != tokens.len() {
        return Err(ReportError::ParamCount {
            index,
            function: function.name.to_owned(),
            expected: function.inputs.len(),
            decoded: tokens.len(),
        });
    }
    Ok(())
}

fn collect_addresses(token: &Token, into: &mut BTreeSet<Address>) {
    match token {
        Token::Address(a) => {
            into.insert(*a);
        }
        Token::String(s) => {
            if let Some(a) = parse_address(s) {
                into.insert(a);
            }
        }
        Token::Array(items) | Token::FixedArray(items) | Token::Tuple(items) => {
            for item in items {
                collect_addresses(item, into);
            }
        }
        _ => {}
    }
}

fn to_value(token: Token, labels: &HashMap<Address, AddressAnnotation>) -> ParamValue {
    let label = |a: Address| {
        labels
            .get(&a)
            .cloned()
            .unwrap_or_else(|| AddressAnnotation::Raw(as_checksummed(&a)))
    };
    match token {
        Token::Address(a) => ParamValue::Address(label(a)),
        Token::Uint(u) => ParamValue::Integer(u),
        Token::Int(i) => ParamValue::Text(signed_to_string(i)),
        Token::Bool(b) => ParamValue::Text(b.to_string()),
        Token::String(s) => match parse_address(&s) {
            Some(a) => ParamValue::Address(label(a)),
            None => ParamValue::Text(s),
        },
        Token::Bytes(b) | Token::FixedBytes(b) => {
            ParamValue::Text(format!("0x{}", hex::encode(b)))
        }
        Token::Array(items) | Token::FixedArray(items) | Token::Tuple(items) => {
            ParamValue::List(items.into_iter().map(|t| to_value(t, labels)).collect())
        }
    }
}

/// Reads a two's complement int256.
fn signed_to_string(value: U256) -> String {
    if value.bit(255) {
        let magnitude = (!value).overflowing_add(U256::one()).0;
        format!("-{}", magnitude)
    } else {
        value.to_string()
    }
}
