use ordledger::config::{generate_auth_token, BitcoinNetwork};

pub fn generate_config(network: &BitcoinNetwork) -> String {
    let auto_predicate_registration = *network != BitcoinNetwork::Regtest;
    let conf = format!(
        r#"# default: event server and read api
# writeonly: event server only
# readonly: read api only, on a ledger written by another process
run_mode = "default"

[storage]
working_dir = "ordledger"

[network]
mode = "{network}"

# Chain events are posted by a chainhook node to this endpoint.
# `external_hostname` must be reachable from that node.
[ingestion]
host = "0.0.0.0"
port = 3099
external_hostname = "127.0.0.1"
auth_token = "{auth_token}"
body_limit = 20971520

[http_api]
host = "0.0.0.0"
port = 3000

[chainhook_node]
rpc_url = "http://127.0.0.1:20456"
auto_predicate_registration = {auto_predicate_registration}
# start_block = 767430

[logs]
ordinals_internals = true
http_internals = false
"#,
        network = network,
        auth_token = generate_auth_token(),
        auto_predicate_registration = auto_predicate_registration,
    );
    conf
}
