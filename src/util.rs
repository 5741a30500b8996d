use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::de::DeserializeOwned;

use crate::req::Reply;
use crate::Result;

pub(crate) fn base64url<T: ?Sized + AsRef<[u8]>>(input: &T) -> String {
    URL_SAFE_NO_PAD.encode(input)
}

pub(crate) fn base64url_decode<T: ?Sized + AsRef<[u8]>>(input: &T) -> Result<Vec<u8>> {
    Ok(URL_SAFE_NO_PAD.decode(input)?)
}

pub(crate) fn read_json<T: DeserializeOwned>(res: Reply) -> Result<T> {
    let res_body = res.into_body();
    debug!("{}", res_body);
    Ok(serde_json::from_str(&res_body)?)
}
