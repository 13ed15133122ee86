use crate::command::{bulk, wrong_arg_count};
use crate::resp::RespValue;
use crate::store::SharedStore;

pub async fn cmd_hset(args: &[RespValue], store: &SharedStore) -> RespValue {
    let [key, field, value] = args else {
        return wrong_arg_count("hset");
    };

    store
        .write()
        .await
        .hset(bulk(key).to_vec(), bulk(field).to_vec(), bulk(value).to_vec());
    RespValue::ok()
}

pub async fn cmd_hget(args: &[RespValue], store: &SharedStore) -> RespValue {
    let [key, field] = args else {
        return wrong_arg_count("hget");
    };

    let store = store.read().await;
    match store.hget(bulk(key), bulk(field)) {
        Some(value) => RespValue::bulk_string(value.clone()),
        None => RespValue::null_bulk_string(),
    }
}
