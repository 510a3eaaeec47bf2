use super::*;

/// Thin JSON-RPC channel to the coin daemon. The pool only ever needs
/// two calls: fetch the next template, submit a solved block.
pub(crate) struct Daemon {
    client: reqwest::Client,
    url: String,
    user: String,
    password: String,
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<Value>,
}

impl Daemon {
    pub(crate) fn new(settings: &Settings) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: settings.daemon_url(),
            user: settings.daemon_user.clone(),
            password: settings.daemon_password.clone(),
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let body = json!({
            "jsonrpc": "1.0",
            "id": "noncepool",
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(self.url.clone())
            .basic_auth(&self.user, Some(&self.password))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("daemon rpc `{method}` request failed"))?;

        let rpc: RpcResponse = response
            .json()
            .await
            .with_context(|| format!("daemon rpc `{method}` returned malformed response"))?;

        if let Some(error) = rpc.error
            && !error.is_null()
        {
            bail!("daemon rpc `{method}` failed: {error}");
        }

        Ok(rpc.result.unwrap_or(Value::Null))
    }

    pub(crate) async fn get_block_template(&self, network: Network) -> Result<BlockTemplate> {
        let mut rules = vec!["segwit"];
        if network == Network::Signet {
            rules.push("signet");
        }

        let result = self
            .call(
                "getblocktemplate",
                json!([{
                    "capabilities": ["coinbasetxn", "workid", "coinbase/append"],
                    "rules": rules,
                }]),
            )
            .await?;

        serde_json::from_value(result).context("malformed getblocktemplate result")
    }

    /// `submitblock` returns null on acceptance. Daemons configured for
    /// the solution-hash convention answer with the block hash instead;
    /// anything else is a reject reason.
    pub(crate) async fn submit_block(&self, block_hex: &str) -> Result<Option<String>> {
        match self.call("submitblock", json!([block_hex])).await? {
            Value::Null => Ok(None),
            Value::String(reply) => Ok(Some(reply)),
            other => bail!("unexpected submitblock reply: {other}"),
        }
    }
}
