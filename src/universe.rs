/// Nifty 50 constituents as Yahoo Finance tickers
pub const NIFTY_50: &[&str] = &[
    "ADANIENT.NS",
    "ADANIPORTS.NS",
    "APOLLOHOSP.NS",
    "ASIANPAINT.NS",
    "AXISBANK.NS",
    "BAJAJ-AUTO.NS",
    "BAJAJFINSV.NS",
    "BAJFINANCE.NS",
    "BEL.NS",
    "BPCL.NS",
    "BRITANNIA.NS",
    "CIPLA.NS",
    "COALINDIA.NS",
    "DRREDDY.NS",
    "EICHERMOT.NS",
    "GAIL.NS",
    "GRASIM.NS",
    "HCLTECH.NS",
    "HDFCBANK.NS",
    "HDFCLIFE.NS",
    "HEROMOTOCO.NS",
    "HINDALCO.NS",
    "HINDUNILVR.NS",
    "ICICIBANK.NS",
    "INDIGO.NS",
    "INFY.NS",
    "ITC.NS",
    "JSWSTEEL.NS",
    "KOTAKBANK.NS",
    "LT.NS",
    "LTIM.NS",
    "MARUTI.NS",
    "NTPC.NS",
    "ONGC.NS",
    "POWERGRID.NS",
    "RELIANCE.NS",
    "SBIN.NS",
    "SBILIFE.NS",
    "SUNPHARMA.NS",
    "TATACONSUM.NS",
    "TATAMOTORS.NS",
    "TATAPOWER.NS",
    "TATASTEEL.NS",
    "TCS.NS",
    "TECHM.NS",
    "TITAN.NS",
    "TORNTPHARM.NS",
    "ULTRACEMCO.NS",
    "UPL.NS",
    "WIPRO.NS",
];

/// Benchmark indices scanned alongside the stock list
pub const INDICES: &[&str] = &["^NSEI", "^NSEBANK"];

/// Named symbol list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Universe {
    Nifty50,
    Indices,
}

impl Universe {
    pub fn symbols(self) -> Vec<String> {
        let list = match self {
            Universe::Nifty50 => NIFTY_50,
            Universe::Indices => INDICES,
        };
        list.iter().map(|s| s.to_string()).collect()
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
            "nifty50" | "nifty" => Some(Universe::Nifty50),
            "indices" | "index" => Some(Universe::Indices),
            _ => None,
        }
    }
}

/// Split a comma separated symbol list, trimming and upper-casing entries
pub fn parse_symbol_list(input: &str) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    for symbol in input
        .split(',')
        .map(|s| s.trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty())
    {
        if !symbols.contains(&symbol) {
            symbols.push(symbol);
        }
    }
    symbols
}
