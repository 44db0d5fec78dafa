use std::{collections::HashMap, fmt, sync::LazyLock};

use serde::{Serialize, Serializer};

//
// Ticker -> CoinGecko coin id
// https://docs.coingecko.com/reference/coins-list
//
const COINGECKO_IDS: &[(&str, &str)] = &[
    ("BTC", "bitcoin"),
    ("ETH", "ethereum"),
    ("SOL", "solana"),
    ("ADA", "cardano"),
    ("XRP", "ripple"),
    ("DOT", "polkadot"),
    ("DOGE", "dogecoin"),
    ("SHIB", "shiba-inu"),
    ("AVAX", "avalanche-2"),
    ("MATIC", "matic-network"),
    ("LINK", "chainlink"),
    ("UNI", "uniswap"),
    ("ATOM", "cosmos"),
    ("LTC", "litecoin"),
    ("ETC", "ethereum-classic"),
    ("XLM", "stellar"),
    ("ALGO", "algorand"),
    ("VET", "vechain"),
    ("FIL", "filecoin"),
    ("TRX", "tron"),
    ("BNB", "binancecoin"),
    ("USDT", "tether"),
    ("USDC", "usd-coin"),
    ("BUSD", "binance-usd"),
    ("DAI", "dai"),
    ("AAVE", "aave"),
    ("MKR", "maker"),
    ("COMP", "compound-governance-token"),
    ("SNX", "havven"),
    ("CRV", "curve-dao-token"),
    ("SUSHI", "sushi"),
    ("YFI", "yearn-finance"),
    ("NEAR", "near"),
    ("FTM", "fantom"),
    ("SAND", "the-sandbox"),
    ("MANA", "decentraland"),
    ("AXS", "axie-infinity"),
    ("GALA", "gala"),
    ("APE", "apecoin"),
    ("LDO", "lido-dao"),
    ("ARB", "arbitrum"),
    ("OP", "optimism"),
    ("SUI", "sui"),
    ("APT", "aptos"),
    ("INJ", "injective-protocol"),
    ("SEI", "sei-network"),
    ("TIA", "celestia"),
    ("JUP", "jupiter-exchange-solana"),
    ("WIF", "dogwifcoin"),
    ("PEPE", "pepe"),
    ("BONK", "bonk"),
];

static RESOLVER: LazyLock<SymbolResolver> =
    LazyLock::new(|| SymbolResolver::from_table(COINGECKO_IDS));

/// Process-wide resolver over the built-in CoinGecko table.
pub fn resolver() -> &'static SymbolResolver {
    &RESOLVER
}

/// Canonical (uppercase) ticker symbol, e.g. `BTC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TickerSymbol(&'static str);

impl TickerSymbol {
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for TickerSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl Serialize for TickerSymbol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0)
    }
}

/// The price provider's own identifier for an asset, e.g. `bitcoin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderId(&'static str);

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Immutable two-way mapping between ticker symbols and provider ids.
pub struct SymbolResolver {
    forward: HashMap<&'static str, ProviderId>,
    reverse: HashMap<ProviderId, TickerSymbol>,
    ordered: Vec<TickerSymbol>,
}

impl SymbolResolver {
    /// Builds both lookup maps from `(ticker, provider id)` pairs.
    /// Tickers are expected in canonical uppercase form.
    pub fn from_table(table: &'static [(&'static str, &'static str)]) -> Self {
        let mut forward = HashMap::with_capacity(table.len());
        let mut reverse = HashMap::with_capacity(table.len());
        let mut ordered = Vec::with_capacity(table.len());

        for &(ticker, id) in table {
            let symbol = TickerSymbol(ticker);
            let provider_id = ProviderId(id);

            forward.insert(ticker, provider_id);
            reverse.insert(provider_id, symbol);
            ordered.push(symbol);
        }

        Self {
            forward,
            reverse,
            ordered,
        }
    }

    fn normalize(symbol: &str) -> String {
        symbol.trim().to_uppercase()
    }

    pub fn resolve(&self, symbol: &str) -> Option<ProviderId> {
        self.forward.get(Self::normalize(symbol).as_str()).copied()
    }

    pub fn is_supported(&self, symbol: &str) -> bool {
        self.resolve(symbol).is_some()
    }

    /// Canonical symbols in table order.
    pub fn list_supported(&self) -> Vec<TickerSymbol> {
        self.ordered.clone()
    }

    pub fn reverse_lookup(&self, id: ProviderId) -> Option<TickerSymbol> {
        self.reverse.get(&id).copied()
    }

    /// Resolves to both halves of the mapping at once.
    pub fn resolve_pair(&self, symbol: &str) -> Option<(TickerSymbol, ProviderId)> {
        let id = self.resolve(symbol)?;
        self.reverse_lookup(id).map(|ticker| (ticker, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_is_case_insensitive() {
        let r = resolver();
        let expected = r.resolve("BTC");

        assert_eq!(expected.map(|id| id.as_str()), Some("bitcoin"));
        assert_eq!(r.resolve("btc"), expected);
        assert_eq!(r.resolve("Btc"), expected);
        assert_eq!(r.resolve("  btc "), expected);
    }

    #[test]
    fn unknown_symbols_resolve_to_none() {
        let r = resolver();

        assert_eq!(r.resolve("doesnotexist"), None);
        assert_eq!(r.resolve(""), None);
        assert!(!r.is_supported("AAPL"));
        assert!(r.is_supported("sol"));
    }

    #[test]
    fn list_supported_keeps_table_order() {
        let symbols = resolver().list_supported();

        assert_eq!(symbols.len(), COINGECKO_IDS.len());
        assert_eq!(symbols[0].as_str(), "BTC");
        assert_eq!(symbols[1].as_str(), "ETH");
        assert_eq!(symbols.last().map(|s| s.as_str()), Some("BONK"));
    }

    #[test]
    fn reverse_lookup_inverts_resolve() {
        let r = resolver();

        for symbol in r.list_supported() {
            let id = r.resolve(symbol.as_str()).expect("listed symbol resolves");
            assert_eq!(r.reverse_lookup(id), Some(symbol));
        }
    }

    #[test]
    fn resolve_pair_returns_canonical_symbol() {
        let (ticker, id) = resolver().resolve_pair("avax").expect("avax is supported");

        assert_eq!(ticker.as_str(), "AVAX");
        assert_eq!(id.as_str(), "avalanche-2");
    }

    #[test]
    fn custom_table() {
        static TABLE: &[(&str, &str)] = &[("FOO", "foo-coin")];
        let r = SymbolResolver::from_table(TABLE);

        assert_eq!(r.resolve("foo").map(|id| id.as_str()), Some("foo-coin"));
        assert_eq!(r.resolve("btc"), None);
    }

    #[test]
    fn ticker_serializes_as_plain_string() {
        let (ticker, _) = resolver().resolve_pair("eth").unwrap();
        assert_eq!(serde_json::to_string(&ticker).unwrap(), "\"ETH\"");
    }
}
