use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportMode {
    Bitcoin,
    Fx,
    Geopolitical,
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section {
    pub marker: &'static str,
    pub guidance: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct Template {
    pub role: &'static str,
    pub task: &'static str,
    pub sections: &'static [Section],
}

const BITCOIN_SECTIONS: &[Section] = &[
    Section {
        marker: "### ⚡️ LIVE MARKET PULSE",
        guidance: "(Synthesize the headlines into a narrative. Bullish/Bearish?)",
    },
    Section {
        marker: "### 🏦 INSTITUTIONAL FLOWS & REGULATION",
        guidance: "(Analyze ETF, SEC, or Institutional mentions in the news.)",
    },
    Section {
        marker: "### 🔮 PRICE ACTION SCENARIOS",
        guidance: "(Bull/Bear Levels based on this news context)",
    },
];

const GEOPOLITICAL_SECTIONS: &[Section] = &[
    Section {
        marker: "### 🌍 THREAT MATRIX",
        guidance: "(Synthesize the news headlines into a threat assessment.)",
    },
    Section {
        marker: "### ⚔️ CONFLICT ZONES",
        guidance: "(Specific updates on wars/tensions from the feed.)",
    },
    Section {
        marker: "### 🛡 MARKET & COMMODITY IMPACT",
        guidance: "(How this news affects Oil, Gold, and Risk Assets.)",
    },
];

const FX_SECTIONS: &[Section] = &[
    Section {
        marker: "**💵 US DOLLAR INDEX (DXY)**",
        guidance: "(Analyze USD sentiment & Yield drivers from news.)\n---",
    },
    Section {
        marker: "### 🇪🇺 EUR/USD",
        guidance: "(Bias | Key Driver)",
    },
    Section {
        marker: "### 🇬🇧 GBP/USD",
        guidance: "(Bias | Key Driver)",
    },
    Section {
        marker: "### 🇯🇵 USD/JPY",
        guidance: "(Bias | Key Driver)",
    },
    Section {
        marker: "### 🇨🇭 USD/CHF",
        guidance: "(Bias | Safe Haven flows)",
    },
    Section {
        marker: "### 🇦🇺 AUD/USD",
        guidance: "(Bias | Commodity/China link)",
    },
    Section {
        marker: "### 🇨🇦 USD/CAD",
        guidance: "(Bias | Oil correlation)",
    },
    Section {
        marker: "### 🇳🇿 NZD/USD",
        guidance: "(Bias | Risk sentiment)",
    },
];

const GLOBAL_SECTIONS: &[Section] = &[
    Section {
        marker: "### 🌐 GLOBAL MACRO PULSE",
        guidance: "(Synthesize the headlines into a cross-market narrative. Risk On/Risk Off?)",
    },
    Section {
        marker: "### 📊 CROSS-ASSET SIGNALS",
        guidance: "(Equities, Bonds, Dollar, Commodities and Crypto: what is moving and why.)",
    },
    Section {
        marker: "### 🧭 RISK OUTLOOK",
        guidance: "(Key catalysts and levels to watch over the next sessions.)",
    },
];

impl ReportMode {
    pub const ALL: [ReportMode; 4] = [
        ReportMode::Bitcoin,
        ReportMode::Fx,
        ReportMode::Geopolitical,
        ReportMode::Global,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportMode::Bitcoin => "BITCOIN",
            ReportMode::Fx => "FX",
            ReportMode::Geopolitical => "GEOPOLITICAL",
            ReportMode::Global => "GLOBAL",
        }
    }

    pub fn template(&self) -> Template {
        match self {
            ReportMode::Bitcoin => Template {
                role: "Institutional Crypto Strategist.",
                task: "Write a comprehensive Bitcoin briefing using the LIVE NEWS below.",
                sections: BITCOIN_SECTIONS,
            },
            ReportMode::Fx => Template {
                role: "Lead FX Strategist.",
                task: "Detailed Outlook for ALL 7 MAJOR CURRENCY PAIRS using LIVE NEWS.",
                sections: FX_SECTIONS,
            },
            ReportMode::Geopolitical => Template {
                role: "Geopolitical Risk Strategist.",
                task: "Analyze global threats using the LIVE NEWS provided.",
                sections: GEOPOLITICAL_SECTIONS,
            },
            ReportMode::Global => Template {
                role: "Chief Global Macro Strategist.",
                task: "Write a concise cross-asset market briefing using the LIVE NEWS below.",
                sections: GLOBAL_SECTIONS,
            },
        }
    }

    /// News search query used when the caller brings no context of its own.
    pub fn default_query(&self) -> &'static str {
        match self {
            ReportMode::Bitcoin => "Bitcoin crypto",
            ReportMode::Fx => "EURUSD GBPUSD USDJPY AUDUSD USDCAD forex",
            ReportMode::Geopolitical => "Geopolitics War Oil Gold Economy",
            ReportMode::Global => "global markets stocks bonds economy",
        }
    }
}

impl fmt::Display for ReportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BITCOIN" | "BTC" => Ok(ReportMode::Bitcoin),
            "FX" | "FOREX" => Ok(ReportMode::Fx),
            "GEOPOLITICAL" | "GEO" => Ok(ReportMode::Geopolitical),
            "GLOBAL" | "MACRO" => Ok(ReportMode::Global),
            other => Err(format!(
                "unknown mode '{other}', expected one of BITCOIN, FX, GEOPOLITICAL, GLOBAL"
            )),
        }
    }
}
