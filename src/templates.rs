//! Command templates (C6, §4.6).
//!
//! Builds one RESP command byte string per workload. Workloads that
//! interpolate a key place the configured sentinel substring (default
//! `__rand_int__`) at the position(s) meant to be randomized; when
//! random-keys mode is enabled the sentinel is padded with literal `'z'`
//! bytes up to the configured slot length `L` (DESIGN NOTES §9, the
//! `packkey` composition) so a fixed-width region exists for the client to
//! rewrite every round.

use crate::args::Args;

/// Parameters that feed command-template assembly, resolved once from `Args`.
pub struct TemplateConfig {
    pub key_prefix: String,
    pub datasize: usize,
    pub incrby: i64,
    pub subkeys: u32,
    /// `L`: the randomization slot length, i.e. `key_prefix.len()` padded
    /// out with `'z'` to the `-r` argument when random keys are enabled.
    pub slot_len: usize,
}

impl TemplateConfig {
    pub fn from_args(args: &Args) -> Self {
        let key_prefix = args.key_prefix.clone();
        let slot_len = match args.random_slot_len() {
            Some(n) => std::cmp::max(key_prefix.len(), n as usize),
            None => key_prefix.len(),
        };
        TemplateConfig {
            key_prefix,
            datasize: args.datasize as usize,
            incrby: args.incrby,
            subkeys: args.subkeys(),
            slot_len,
        }
    }

    /// The literal bytes standing in for one randomizable key: the sentinel,
    /// padded with `'z'` to `slot_len` bytes.
    fn key_field(&self) -> Vec<u8> {
        let mut field = self.key_prefix.as_bytes().to_vec();
        field.resize(self.slot_len, b'z');
        field
    }

    fn payload(&self) -> Vec<u8> {
        vec![b'x'; self.datasize]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Workload {
    PingInline,
    PingBulk,
    Set,
    Get,
    Incr,
    Decr,
    IncrBy,
    Lpush,
    Rpush,
    Lpop,
    Rpop,
    Sadd,
    Spop,
    Hset,
    Hget,
    Hmset,
    Hmget,
    Hkeys,
    Hincrby,
    Zadd,
    Zrange,
    ZrangeByScore,
    Zrank,
    Lrange100,
    Lrange300,
    Lrange450,
    Lrange600,
    Mset,
}

impl Workload {
    pub fn title(&self) -> &'static str {
        match self {
            Workload::PingInline => "PING_INLINE",
            Workload::PingBulk => "PING_BULK",
            Workload::Set => "SET",
            Workload::Get => "GET",
            Workload::Incr => "INCR",
            Workload::Decr => "DECR",
            Workload::IncrBy => "INCRBY",
            Workload::Lpush => "LPUSH",
            Workload::Rpush => "RPUSH",
            Workload::Lpop => "LPOP",
            Workload::Rpop => "RPOP",
            Workload::Sadd => "SADD",
            Workload::Spop => "SPOP",
            Workload::Hset => "HSET",
            Workload::Hget => "HGET",
            Workload::Hmset => "HMSET",
            Workload::Hmget => "HMGET",
            Workload::Hkeys => "HKEYS",
            Workload::Hincrby => "HINCRBY",
            Workload::Zadd => "ZADD",
            Workload::Zrange => "ZRANGE",
            Workload::ZrangeByScore => "ZRANGEBYSCORE",
            Workload::Zrank => "ZRANK",
            Workload::Lrange100 => "LRANGE_100",
            Workload::Lrange300 => "LRANGE_300",
            Workload::Lrange450 => "LRANGE_450",
            Workload::Lrange600 => "LRANGE_600",
            Workload::Mset => "MSET",
        }
    }

    pub fn parse(name: &str) -> Option<Workload> {
        let lower = name.to_ascii_lowercase();
        Some(match lower.as_str() {
            "ping_inline" => Workload::PingInline,
            "ping_bulk" | "ping" => Workload::PingBulk,
            "set" => Workload::Set,
            "get" => Workload::Get,
            "incr" => Workload::Incr,
            "decr" => Workload::Decr,
            "incrby" => Workload::IncrBy,
            "lpush" => Workload::Lpush,
            "rpush" => Workload::Rpush,
            "lpop" => Workload::Lpop,
            "rpop" => Workload::Rpop,
            "sadd" => Workload::Sadd,
            "spop" => Workload::Spop,
            "hset" => Workload::Hset,
            "hget" => Workload::Hget,
            "hmset" => Workload::Hmset,
            "hmget" => Workload::Hmget,
            "hkeys" => Workload::Hkeys,
            "hincrby" => Workload::Hincrby,
            "zadd" => Workload::Zadd,
            "zrange" => Workload::Zrange,
            "zrangebyscore" => Workload::ZrangeByScore,
            "zrank" => Workload::Zrank,
            "lrange_100" | "lrange" => Workload::Lrange100,
            "lrange_300" => Workload::Lrange300,
            "lrange_450" => Workload::Lrange450,
            "lrange_600" => Workload::Lrange600,
            "mset" => Workload::Mset,
            _ => return None,
        })
    }

    pub fn default_suite() -> Vec<Workload> {
        vec![
            Workload::PingInline,
            Workload::PingBulk,
            Workload::Set,
            Workload::Get,
            Workload::Incr,
            Workload::Decr,
            Workload::IncrBy,
            Workload::Lpush,
            Workload::Rpush,
            Workload::Lpop,
            Workload::Rpop,
            Workload::Sadd,
            Workload::Spop,
            Workload::Hset,
            Workload::Hget,
            Workload::Hmset,
            Workload::Hmget,
            Workload::Hkeys,
            Workload::Hincrby,
            Workload::Zadd,
            Workload::Zrange,
            Workload::ZrangeByScore,
            Workload::Zrank,
            Workload::Lrange100,
            Workload::Lrange300,
            Workload::Lrange450,
            Workload::Lrange600,
            Workload::Mset,
        ]
    }

    /// Builds this workload's RESP command byte string.
    pub fn build(&self, cfg: &TemplateConfig) -> Vec<u8> {
        use Workload::*;
        match self {
            PingInline => b"PING\r\n".to_vec(),
            PingBulk => resp_command(&[b"PING"]),
            Set => {
                let key = prefixed(b"key:", &cfg.key_field());
                resp_command(&[b"SET", &key, &cfg.payload()])
            }
            Get => {
                let key = prefixed(b"key:", &cfg.key_field());
                resp_command(&[b"GET", &key])
            }
            Incr => {
                let key = prefixed(b"counter:", &cfg.key_field());
                resp_command(&[b"INCR", &key])
            }
            Decr => {
                let key = prefixed(b"counter:", &cfg.key_field());
                resp_command(&[b"DECR", &key])
            }
            IncrBy => {
                let key = prefixed(b"counter:", &cfg.key_field());
                let amount = cfg.incrby.to_string().into_bytes();
                resp_command(&[b"INCRBY", &key, &amount])
            }
            Lpush => resp_command(&[b"LPUSH", b"mylist", &cfg.payload()]),
            Rpush => resp_command(&[b"RPUSH", b"mylist", &cfg.payload()]),
            Lpop => resp_command(&[b"LPOP", b"mylist"]),
            Rpop => resp_command(&[b"RPOP", b"mylist"]),
            Sadd => {
                let member = prefixed(b"element:", &cfg.key_field());
                resp_command(&[b"SADD", b"myset", &member])
            }
            Spop => resp_command(&[b"SPOP", b"myset"]),
            Hset => {
                let key = prefixed(b"myset:", &cfg.key_field());
                resp_command(&[b"HSET", &key, b"field:0", &cfg.payload()])
            }
            Hget => {
                let key = prefixed(b"myset:", &cfg.key_field());
                resp_command(&[b"HGET", &key, b"field:0"])
            }
            Hmset => {
                let key = prefixed(b"myset:", &cfg.key_field());
                let mut parts: Vec<Vec<u8>> = vec![b"HMSET".to_vec(), key];
                for i in 0..cfg.subkeys {
                    parts.push(format!("field:{i}").into_bytes());
                    parts.push(cfg.payload());
                }
                let refs: Vec<&[u8]> = parts.iter().map(|v| v.as_slice()).collect();
                resp_command(&refs)
            }
            Hmget => {
                let key = prefixed(b"myset:", &cfg.key_field());
                let mut parts: Vec<Vec<u8>> = vec![b"HMGET".to_vec(), key];
                for i in 0..cfg.subkeys {
                    parts.push(format!("field:{i}").into_bytes());
                }
                let refs: Vec<&[u8]> = parts.iter().map(|v| v.as_slice()).collect();
                resp_command(&refs)
            }
            Hkeys => {
                let key = prefixed(b"myset:", &cfg.key_field());
                resp_command(&[b"HKEYS", &key])
            }
            Hincrby => {
                let key = prefixed(b"myset:", &cfg.key_field());
                let amount = cfg.incrby.to_string().into_bytes();
                resp_command(&[b"HINCRBY", &key, b"field:0", &amount])
            }
            Zadd => {
                let key = prefixed(b"myzset:", &cfg.key_field());
                let mut parts: Vec<Vec<u8>> = vec![b"ZADD".to_vec(), key];
                for i in 0..cfg.subkeys {
                    parts.push(i.to_string().into_bytes());
                    parts.push(format!("element:{i}").into_bytes());
                }
                let refs: Vec<&[u8]> = parts.iter().map(|v| v.as_slice()).collect();
                resp_command(&refs)
            }
            Zrange => {
                let key = prefixed(b"myzset:", &cfg.key_field());
                resp_command(&[b"ZRANGE", &key, b"0", b"-1"])
            }
            ZrangeByScore => {
                let key = prefixed(b"myzset:", &cfg.key_field());
                resp_command(&[b"ZRANGEBYSCORE", &key, b"0", b"+inf"])
            }
            Zrank => {
                let key = prefixed(b"myzset:", &cfg.key_field());
                resp_command(&[b"ZRANK", &key, b"element:0"])
            }
            Lrange100 => resp_command(&[b"LRANGE", b"mylist", b"0", b"99"]),
            Lrange300 => resp_command(&[b"LRANGE", b"mylist", b"0", b"299"]),
            Lrange450 => resp_command(&[b"LRANGE", b"mylist", b"0", b"449"]),
            Lrange600 => resp_command(&[b"LRANGE", b"mylist", b"0", b"599"]),
            Mset => {
                let mut parts: Vec<Vec<u8>> = vec![b"MSET".to_vec()];
                for i in 0..10 {
                    parts.push(prefixed(format!("key:{i}:").as_bytes(), &cfg.key_field()));
                    parts.push(cfg.payload());
                }
                let refs: Vec<&[u8]> = parts.iter().map(|v| v.as_slice()).collect();
                resp_command(&refs)
            }
        }
    }

    /// Builds the RESP command for an arbitrary trailing CLI command, e.g.
    /// `resp-bench -n 100 GET foo`. No randomization slot is introduced.
    pub fn custom(words: &[String]) -> Vec<u8> {
        let refs: Vec<&[u8]> = words.iter().map(|w| w.as_bytes()).collect();
        resp_command(&refs)
    }
}

fn prefixed(prefix: &[u8], suffix: &[u8]) -> Vec<u8> {
    let mut v = Vec::with_capacity(prefix.len() + suffix.len());
    v.extend_from_slice(prefix);
    v.extend_from_slice(suffix);
    v
}

/// Encodes a RESP multibulk command: `*N\r\n$len\r\narg\r\n...`.
fn resp_command(args: &[&[u8]]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(format!("*{}\r\n", args.len()).as_bytes());
    for arg in args {
        buf.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
        buf.extend_from_slice(arg);
        buf.extend_from_slice(b"\r\n");
    }
    buf
}

/// Builds the `SELECT <db>` prefix command (§4.2).
pub fn select_command(dbnum: u32) -> Vec<u8> {
    resp_command(&[b"SELECT", dbnum.to_string().as_bytes()])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> TemplateConfig {
        TemplateConfig {
            key_prefix: "__rand_int__".to_string(),
            datasize: 3,
            incrby: 1,
            subkeys: 10,
            slot_len: "__rand_int__".len(),
        }
    }

    #[test]
    fn ping_inline_is_a_literal() {
        assert_eq!(Workload::PingInline.build(&cfg()), b"PING\r\n");
    }

    #[test]
    fn ping_bulk_is_resp_encoded() {
        assert_eq!(Workload::PingBulk.build(&cfg()), b"*1\r\n$4\r\nPING\r\n");
    }

    #[test]
    fn set_contains_sentinel_and_payload() {
        let bytes = Workload::Set.build(&cfg());
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("__rand_int__"));
        assert!(text.contains("xxx"));
    }

    #[test]
    fn slot_len_pads_with_z_when_random_keys_wider_than_sentinel() {
        let mut c = cfg();
        c.slot_len = 20;
        let field = c.key_field();
        assert_eq!(field.len(), 20);
        assert!(field.starts_with(b"__rand_int__"));
        assert!(field[12..].iter().all(|&b| b == b'z'));
    }

    #[test]
    fn mset_has_ten_pairs() {
        let bytes = Workload::Mset.build(&cfg());
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text.matches("__rand_int__").count(), 10);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(Workload::parse("Set"), Some(Workload::Set));
        assert_eq!(Workload::parse("bogus"), None);
    }

    #[test]
    fn select_command_round_trips() {
        assert_eq!(select_command(3), b"*2\r\n$6\r\nSELECT\r\n$1\r\n3\r\n");
    }
}
