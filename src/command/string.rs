use crate::command::{bulk, wrong_arg_count};
use crate::resp::RespValue;
use crate::store::SharedStore;

pub async fn cmd_get(args: &[RespValue], store: &SharedStore) -> RespValue {
    let [key] = args else {
        return wrong_arg_count("get");
    };

    let store = store.read().await;
    match store.get(bulk(key)) {
        Some(value) => RespValue::bulk_string(value.clone()),
        None => RespValue::null_bulk_string(),
    }
}

pub async fn cmd_set(args: &[RespValue], store: &SharedStore) -> RespValue {
    let [key, value] = args else {
        return wrong_arg_count("set");
    };

    store
        .write()
        .await
        .set(bulk(key).to_vec(), bulk(value).to_vec());
    RespValue::ok()
}
