/*!
## External data sources
- Contract ABI is pulled from https://www.sourcify.dev

Only consulted for destinations whose ABI is not embedded, and only
when the user opts in with `--sourcify`.
*/
use std::str::FromStr;

use anyhow::{bail, Result};
use log::debug;
use reqwest::{header::CONTENT_TYPE, StatusCode, Url};
use serde_json::Value;
use web3::types::H160;

use crate::parsing::{abi_from_metadata, as_checksummed};

const SOURCIFY_FULL: &str = "https://repo.sourcify.dev/contracts/full_match/";
const SOURCIFY_PARTIAL: &str = "https://repo.sourcify.dev/contracts/partial_match/";

/// Returns the JSON ABI Sourcify holds for a contract address, if any.
///
/// Full matches are preferred, partial matches are accepted.
pub async fn abi_from_sourcify_api(chain_id: u64, address: &H160) -> Result<Option<String>> {
    let client = reqwest::Client::new();
    let a = format!("{}/{}/{}", chain_id, as_checksummed(address), "metadata.json");

    for base in [SOURCIFY_FULL, SOURCIFY_PARTIAL] {
        let url = Url::from_str(base)?.join(&a)?;
        let response = client
            .get(url)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await;
        let Ok(r) = response else { bail!("The request failed for {}", a) };
        if let StatusCode::OK = r.status() {
            let v: Value = r.json().await?;
            return Ok(Some(abi_from_metadata(&v)?));
        }
        debug!("Status code: {} for {}{}", r.status(), base, a);
    }
    Ok(None)
}
