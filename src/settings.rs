use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewardType {
    Pow,
    Pos,
}

impl FromStr for RewardType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pow" => Ok(RewardType::Pow),
            "pos" => Ok(RewardType::Pos),
            other => bail!("unknown reward type `{other}`"),
        }
    }
}

impl fmt::Display for RewardType {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            RewardType::Pow => write!(f, "pow"),
            RewardType::Pos => write!(f, "pos"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "noncepool", version, about = "Stratum mining pool server")]
pub struct Settings {
    #[arg(
        long,
        env = "NONCEPOOL_DAEMON_HOST",
        default_value = "127.0.0.1",
        help = "Coin daemon RPC host"
    )]
    pub daemon_host: String,
    #[arg(long, env = "NONCEPOOL_DAEMON_PORT", default_value_t = 8332)]
    pub daemon_port: u16,
    #[arg(long, env = "NONCEPOOL_DAEMON_USER", default_value = "")]
    pub daemon_user: String,
    #[arg(
        long,
        env = "NONCEPOOL_DAEMON_PASSWORD",
        default_value = "",
        hide_env_values = true
    )]
    pub daemon_password: String,
    #[arg(
        long,
        default_value = "sha256d",
        help = "PoW algorithm id (sha256d, scrypt)"
    )]
    pub pow_algorithm: Algorithm,
    #[arg(long, default_value = "pow", help = "Reward type (pow, pos)")]
    pub reward: RewardType,
    #[arg(long, help = "Append this tx-comment to the coinbase")]
    pub tx_comment: Option<String>,
    #[arg(long, help = "The daemon returns the block hash from submitblock")]
    pub solution_block_hash: bool,
    #[arg(long, help = "ZMQ hashblock endpoint for blocknotify")]
    pub zmq_block_notifications: Option<String>,
    #[arg(long, default_value = "bitcoin", help = "Network the pool mines")]
    pub chain: Network,
    #[arg(long, help = "Pool wallet address receiving block rewards")]
    pub central_wallet: String,
    #[arg(long, default_value = "/noncepool/", help = "Coinbase signature string")]
    pub coinbase_extras: String,
    #[arg(long, default_value_t = 4)]
    pub extranonce2_size: usize,
    #[arg(
        long,
        default_value_t = 0,
        value_parser = clap::value_parser!(u8).range(0..=31),
        help = "Pool instance id, packed into every extranonce1"
    )]
    pub instance_id: u8,
    #[arg(long, default_value_t = 3333, help = "Stratum TCP port")]
    pub listen_port: u16,
    #[arg(long, default_value_t = 5, help = "Seconds between tip polls")]
    pub prevhash_refresh_interval: u64,
    #[arg(long, default_value_t = 60, help = "Seconds between mempool refreshes")]
    pub merkle_refresh_interval: u64,
    #[arg(long, default_value_t = 300, help = "Seconds before forcing fresh work")]
    pub force_refresh_interval: u64,
    #[arg(long, default_value_t = 180, help = "Seconds before issued work expires")]
    pub work_expire: u64,
    #[arg(long)]
    pub disable_vardiff: bool,
    #[arg(long, default_value_t = 1.0, help = "Starting difficulty per connection")]
    pub pool_diff: f64,
    #[arg(long, default_value_t = 0.00390625)]
    pub vardiff_min: f64,
    #[arg(long, default_value_t = 65536.0)]
    pub vardiff_max: f64,
    #[arg(long, default_value_t = 15, help = "Target seconds between shares")]
    pub vardiff_target_time: u64,
    #[arg(long, default_value_t = 90, help = "Seconds between retarget checks")]
    pub vardiff_retarget_time: u64,
    #[arg(long, default_value_t = 30.0)]
    pub vardiff_variance_percent: f64,
    #[arg(long, help = "Restrict difficulties to powers of two")]
    pub vardiff_x2: bool,
    #[arg(long, help = "Round difficulties to whole numbers")]
    pub vardiff_integer: bool,
    #[arg(long, default_value_t = 1.0, help = "Difficulty scale for non-sha256d algorithms")]
    pub share_multiplier: f64,
    #[arg(long, help = "Reject workers presenting no password")]
    pub users_check_password: bool,
    #[arg(long)]
    pub disable_worker_banning: bool,
    #[arg(long, default_value_t = 600)]
    pub worker_cache_time: u64,
    #[arg(long, default_value_t = 300)]
    pub worker_ban_time: u64,
    #[arg(long, default_value_t = 500)]
    pub invalid_shares_percent: u64,
    #[arg(long, default_value_t = 200)]
    pub invalid_shares_spam: u64,
    #[arg(long, help = "Record share events to this JSON-lines file")]
    pub events_file: Option<PathBuf>,
}

impl Settings {
    pub fn daemon_url(&self) -> String {
        format!("http://{}:{}", self.daemon_host, self.daemon_port)
    }

    pub(crate) fn vardiff_config(&self) -> vardiff::VardiffConfig {
        vardiff::VardiffConfig {
            enabled: !self.disable_vardiff,
            min_target: self.vardiff_min,
            max_target: self.vardiff_max,
            target_time: self.vardiff_target_time,
            retarget_time: self.vardiff_retarget_time,
            variance_percent: self.vardiff_variance_percent,
            x2_mode: self.vardiff_x2,
            float: !self.vardiff_integer,
        }
    }

    pub(crate) fn worker_policy(&self) -> workers::WorkerPolicy {
        workers::WorkerPolicy {
            check_password: self.users_check_password,
            banning: !self.disable_worker_banning,
            cache_time: self.worker_cache_time,
            ban_time: self.worker_ban_time,
            invalid_percent: self.invalid_shares_percent,
            invalid_spam: self.invalid_shares_spam,
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Settings::parse_from([
            "noncepool",
            "--central-wallet",
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4",
            "--instance-id",
            "31",
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_standard_deployment() {
        let settings = Settings::for_tests();

        assert_eq!(settings.prevhash_refresh_interval, 5);
        assert_eq!(settings.merkle_refresh_interval, 60);
        assert_eq!(settings.force_refresh_interval, 300);
        assert_eq!(settings.work_expire, 180);
        assert_eq!(settings.vardiff_target_time, 15);
        assert_eq!(settings.vardiff_retarget_time, 90);
        assert_eq!(settings.worker_ban_time, 300);
        assert_eq!(settings.invalid_shares_spam, 200);
        assert_eq!(settings.extranonce2_size, 4);
        assert_eq!(settings.pow_algorithm, Algorithm::Sha256d);
        assert_eq!(settings.reward, RewardType::Pow);
        assert!(!settings.disable_vardiff);
        assert!(!settings.disable_worker_banning);
    }

    #[test]
    fn instance_id_is_range_checked() {
        let result = Settings::try_parse_from([
            "noncepool",
            "--central-wallet",
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4",
            "--instance-id",
            "32",
        ]);

        assert!(result.is_err(), "instance id 32 must refuse to start");
    }

    #[test]
    fn unknown_algorithm_is_refused_at_parse() {
        let result = Settings::try_parse_from([
            "noncepool",
            "--central-wallet",
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4",
            "--pow-algorithm",
            "x11",
        ]);

        assert!(result.is_err(), "unknown algorithm must refuse to start");
    }

    #[test]
    fn central_wallet_is_required() {
        assert!(Settings::try_parse_from(["noncepool"]).is_err());
    }

    #[test]
    fn daemon_url_combines_host_and_port() {
        let settings = Settings::for_tests();
        assert_eq!(settings.daemon_url(), "http://127.0.0.1:8332");
    }

    #[test]
    fn reward_type_parses_case_insensitively() {
        assert_eq!("POS".parse::<RewardType>().unwrap(), RewardType::Pos);
        assert!("proof".parse::<RewardType>().is_err());
    }
}
