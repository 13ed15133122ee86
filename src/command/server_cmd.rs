use crate::command::{bulk, wrong_arg_count};
use crate::resp::RespValue;

pub fn cmd_ping(args: &[RespValue]) -> RespValue {
    match args {
        [] => RespValue::simple_string("PONG"),
        [msg] => {
            let data = bulk(msg);
            // A simple string can't carry line breaks
            if data.contains(&b'\r') || data.contains(&b'\n') {
                RespValue::bulk_string(data.to_vec())
            } else {
                RespValue::simple_string(String::from_utf8_lossy(data))
            }
        }
        _ => wrong_arg_count("ping"),
    }
}
