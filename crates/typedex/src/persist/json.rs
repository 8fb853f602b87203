use crate::error::{Result, TypedexError};
use crate::store::{Store, StoreSnapshot};

pub(super) fn encode(store: &Store) -> Result<String> {
    let mut document = serde_json::to_string_pretty(&store.snapshot())
        .map_err(|err| TypedexError::Encode(err.to_string()))?;
    document.push('\n');
    Ok(document)
}

pub(super) fn decode(text: &str, origin: &str) -> Result<Store> {
    let snapshot: StoreSnapshot =
        serde_json::from_str(text).map_err(|err| TypedexError::decode(origin, err))?;
    Ok(Store::from_snapshot(snapshot))
}
