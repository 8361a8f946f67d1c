use {
    super::{
        serde_parsers::deserialize_string_u64,
        ApiError,
        BlockchainInfo,
        NodeApi,
        Validator,
        NO_SUCH_CHAIN,
    },
    crate::ids::{Id, NodeId},
    async_trait::async_trait,
    reqwest::Client,
    serde::{de::DeserializeOwned, Deserialize},
    serde_json::{json, Value},
    std::{collections::HashMap, time::Duration},
};

pub const INFO_ENDPOINT: &str = "ext/info";
pub const PLATFORM_ENDPOINT: &str = "ext/bc/P";
pub const ADMIN_ENDPOINT: &str = "ext/admin";

/// Per-request timeout used when no custom client is given.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Builder for [JsonRpcNodeApi] configuration
pub struct JsonRpcNodeApiBuilder {
    client: Option<Client>,
    timeout: Duration,
}

impl Default for JsonRpcNodeApiBuilder {
    fn default() -> Self {
        Self {
            client: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl JsonRpcNodeApiBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a custom HTTP client. Overrides [Self::with_timeout].
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<JsonRpcNodeApi, ApiError> {
        let client = match self.client {
            Some(client) => client,
            None => Client::builder().timeout(self.timeout).build()?,
        };

        Ok(JsonRpcNodeApi { client })
    }
}

/// [NodeApi] over the node's JSON-RPC endpoints.
#[derive(Clone)]
pub struct JsonRpcNodeApi {
    client: Client,
}

impl JsonRpcNodeApi {
    pub fn builder() -> JsonRpcNodeApiBuilder {
        JsonRpcNodeApiBuilder::default()
    }

    async fn call<T: DeserializeOwned>(
        &self,
        uri: &str,
        endpoint: &str,
        method: &str,
        params: Value,
    ) -> Result<T, ApiError> {
        let url = format!("{}/{endpoint}", uri.trim_end_matches('/'));
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        // Nodes answer RPC-level failures with a JSON body and sometimes a
        // non-2xx status, so try the envelope first.
        let envelope = match serde_json::from_str::<RpcResponse>(&text) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(ApiError::Status {
                    status: status.as_u16(),
                    body: text,
                })
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(error) = envelope.error {
            if error.message.contains(NO_SUCH_CHAIN) {
                return Err(ApiError::NoSuchChain(error.message));
            }

            return Err(ApiError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        Ok(serde_json::from_value(envelope.result.unwrap_or(Value::Null))?)
    }
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    #[serde(default)]
    code: i64,
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IsBootstrappedReply {
    is_bootstrapped: bool,
}

#[derive(Deserialize)]
struct ValidatorsReply {
    validators: Vec<Validator>,
}

/// Older nodes report a bare weight per node, newer ones an object.
#[derive(Deserialize)]
#[serde(untagged)]
enum ValidatorWeight {
    Plain(#[serde(deserialize_with = "deserialize_string_u64")] u64),
    Detailed {
        #[serde(deserialize_with = "deserialize_string_u64")]
        weight: u64,
    },
}

#[derive(Deserialize)]
struct ValidatorsAtReply {
    validators: HashMap<NodeId, ValidatorWeight>,
}

#[derive(Deserialize)]
struct BlockchainsReply {
    blockchains: Vec<BlockchainInfo>,
}

#[derive(Deserialize)]
struct AliasesReply {
    #[serde(default)]
    aliases: Vec<String>,
}

#[async_trait]
impl NodeApi for JsonRpcNodeApi {
    async fn is_bootstrapped(&self, uri: &str, chain: &str) -> Result<bool, ApiError> {
        let reply: IsBootstrappedReply = self
            .call(
                uri,
                INFO_ENDPOINT,
                "info.isBootstrapped",
                json!({ "chain": chain }),
            )
            .await?;

        Ok(reply.is_bootstrapped)
    }

    async fn get_current_validators(
        &self,
        uri: &str,
        subnet_id: Id,
    ) -> Result<Vec<Validator>, ApiError> {
        let reply: ValidatorsReply = self
            .call(
                uri,
                PLATFORM_ENDPOINT,
                "platform.getCurrentValidators",
                json!({ "subnetID": subnet_id }),
            )
            .await?;

        Ok(reply.validators)
    }

    async fn get_validators_at(
        &self,
        uri: &str,
        subnet_id: Id,
    ) -> Result<HashMap<NodeId, u64>, ApiError> {
        let reply: ValidatorsAtReply = self
            .call(
                uri,
                PLATFORM_ENDPOINT,
                "platform.getValidatorsAt",
                json!({ "height": "proposed", "subnetID": subnet_id }),
            )
            .await?;

        Ok(reply
            .validators
            .into_iter()
            .map(|(node_id, weight)| match weight {
                ValidatorWeight::Plain(weight) | ValidatorWeight::Detailed { weight } => {
                    (node_id, weight)
                }
            })
            .collect())
    }

    async fn get_blockchains(&self, uri: &str) -> Result<Vec<BlockchainInfo>, ApiError> {
        let reply: BlockchainsReply = self
            .call(uri, PLATFORM_ENDPOINT, "platform.getBlockchains", json!({}))
            .await?;

        Ok(reply.blockchains)
    }

    async fn get_chain_aliases(&self, uri: &str, chain_id: Id) -> Result<Vec<String>, ApiError> {
        let reply: AliasesReply = self
            .call(
                uri,
                ADMIN_ENDPOINT,
                "admin.getChainAliases",
                json!({ "chain": chain_id }),
            )
            .await?;

        Ok(reply.aliases)
    }

    async fn alias_chain(&self, uri: &str, chain_id: Id, alias: &str) -> Result<(), ApiError> {
        let _: Value = self
            .call(
                uri,
                ADMIN_ENDPOINT,
                "admin.aliasChain",
                json!({ "chain": chain_id, "alias": alias }),
            )
            .await?;

        Ok(())
    }
}
