//! Column layouts per transport.
//!
//! Each transport serializes the same dataset differently: the rendered page
//! nests its headers across several rows, the CSV download has flat Chinese
//! headers, and the feed uses its own keys. Ordinals are the positions each
//! column has historically held in that transport's payload.

use crate::models::ColumnSpec;
use crate::sources::Transport;

/// Where to find the figures in an institutional-investor table.
#[derive(Debug, Clone, Copy)]
pub struct InstitutionalLayout {
    pub name: ColumnSpec,
    pub identity: ColumnSpec,
    pub net_open_interest: ColumnSpec,
    /// Identity label fragment of the foreign institutional row
    pub foreign_label: &'static str,
    /// Identity label fragment of the investment trust row
    pub trust_label: &'static str,
}

/// Where to find the figures in a large-trader table.
#[derive(Debug, Clone, Copy)]
pub struct LargeTraderLayout {
    pub name: ColumnSpec,
    pub month: ColumnSpec,
    pub category: ColumnSpec,
    pub top5_long: ColumnSpec,
    pub top5_short: ColumnSpec,
    /// Contract-month value meaning "all months combined"
    pub all_months: &'static str,
    /// Trader-category value meaning "specific institutional"
    pub specific_category: &'static str,
}

const NAME_ALIASES: &[&str] = &["商品名稱", "ContractName", "Contract"];
const IDENTITY_ALIASES: &[&str] = &["身份別", "身分別", "Item", "Identity"];
const NET_OI_ALIASES: &[&str] = &[
    "多空未平倉口數淨額",
    "OpenInterest(Net)",
    "OpenInterestNetVolume",
];
const MONTH_ALIASES: &[&str] = &[
    "到期月份(週別)",
    "到期月份",
    "ContractMonth(Week)",
    "ContractMonth",
];
const CATEGORY_ALIASES: &[&str] = &["交易人類別", "TypeOfTraders", "TraderType"];
const TOP5_LONG_ALIASES: &[&str] = &["前五大交易人買方", "Top5Buy", "TopFiveBuy"];
const TOP5_SHORT_ALIASES: &[&str] = &["前五大交易人賣方", "Top5Sell", "TopFiveSell"];

pub const FOREIGN_LABEL: &str = "外資";
pub const TRUST_LABEL: &str = "投信";

// 序號 (rendered) or 日期 (download, feed), 商品名稱, 身份別, six trading
// columns, six open-interest columns. Net contracts is the fifth of the
// latter in every transport.
const INSTITUTIONAL: InstitutionalLayout = InstitutionalLayout {
    name: ColumnSpec::new("product name", NAME_ALIASES, 1),
    identity: ColumnSpec::new("identity", IDENTITY_ALIASES, 2),
    net_open_interest: ColumnSpec::new("net open interest", NET_OI_ALIASES, 13),
    foreign_label: FOREIGN_LABEL,
    trust_label: TRUST_LABEL,
};

// Rendered page: 契約代號, 商品名稱, 到期月份, 交易人類別, 全市場部位, then
// top-5 buy / sell. Month and category are spelled out.
const RENDERED_LARGE_TRADER: LargeTraderLayout = LargeTraderLayout {
    name: ColumnSpec::new("product name", NAME_ALIASES, 1),
    month: ColumnSpec::new("contract month", MONTH_ALIASES, 2),
    category: ColumnSpec::new("trader category", CATEGORY_ALIASES, 3),
    top5_long: ColumnSpec::new("top-5 long", TOP5_LONG_ALIASES, 5),
    top5_short: ColumnSpec::new("top-5 short", TOP5_SHORT_ALIASES, 6),
    all_months: "所有契約",
    specific_category: "特定法人",
};

// Download and feed: 日期, 商品(契約), 商品名稱, 到期月份(週別), 交易人類別,
// 前五大買方, 前五大賣方, ... Month and category are numeric codes.
const FLAT_LARGE_TRADER: LargeTraderLayout = LargeTraderLayout {
    name: ColumnSpec::new("product name", NAME_ALIASES, 2),
    month: ColumnSpec::new("contract month", MONTH_ALIASES, 3),
    category: ColumnSpec::new("trader category", CATEGORY_ALIASES, 4),
    top5_long: ColumnSpec::new("top-5 long", TOP5_LONG_ALIASES, 5),
    top5_short: ColumnSpec::new("top-5 short", TOP5_SHORT_ALIASES, 6),
    all_months: "999999",
    specific_category: "1",
};

pub fn institutional(_transport: Transport) -> &'static InstitutionalLayout {
    &INSTITUTIONAL
}

pub fn large_trader(transport: Transport) -> &'static LargeTraderLayout {
    match transport {
        Transport::Rendered => &RENDERED_LARGE_TRADER,
        Transport::Download | Transport::Feed => &FLAT_LARGE_TRADER,
    }
}
