use std::collections::HashSet;

use dd_core::{Error, Result, Schedule};
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::document::parse_selector;
use crate::drivers::{CastTarget, Chain, Driver, DriverKind, RegexMethod, Template, Value};
use crate::parser::{Field, OfferParser};

/// A scalar written directly in the schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "driver", rename_all = "lowercase")]
pub enum DriverKindSpec {
    String {
        string: String,
    },
    Html {
        query: String,
        #[serde(default)]
        attribute: Option<String>,
    },
    Format {
        format: String,
    },
    Regex {
        regex: String,
        #[serde(default)]
        method: RegexMethodSpec,
        #[serde(default)]
        group_index: i64,
        #[serde(default)]
        join_groups: Option<String>,
    },
    Cast {
        #[serde(rename = "type")]
        target: CastTargetSpec,
    },
    Math {
        equation: String,
    },
    Money {
        currency: String,
        #[serde(default = "default_true")]
        shorten: bool,
        #[serde(default)]
        prepend_currency: bool,
    },
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegexMethodSpec {
    #[default]
    FindAll,
    Search,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CastTargetSpec {
    Float,
    Int,
    Str,
}

/// A driver as written in the offers file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverSpec {
    #[serde(flatten)]
    pub kind: DriverKindSpec,
    #[serde(default)]
    pub ignore_errors: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChainItem {
    Driver(DriverSpec),
    Literal(Literal),
}

/// How a field is produced: a literal, one driver, or a list of both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldInput {
    Chain(Vec<ChainItem>),
    Driver(DriverSpec),
    Literal(Literal),
}

/// One retailer offer as declared in the offers file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferSchema {
    pub retailer_name: String,
    pub offer_id: String,
    pub scrape_url: String,
    pub schedule: Schedule,

    #[serde(default)]
    pub sale_id: Option<FieldInput>,

    pub title: FieldInput,
    pub summary: FieldInput,
    pub image: FieldInput,
    pub url: FieldInput,
    pub price_full: FieldInput,
    #[serde(default)]
    pub price_discount: Option<FieldInput>,

    #[serde(default)]
    pub rating: Option<FieldInput>,
    #[serde(default)]
    pub rating_top: Option<FieldInput>,
    #[serde(default)]
    pub available_percentage: Option<FieldInput>,
    #[serde(default)]
    pub available_total: Option<FieldInput>,
    #[serde(default)]
    pub available_sold: Option<FieldInput>,
    #[serde(default)]
    pub available_still: Option<FieldInput>,
}

impl OfferSchema {
    /// Field inputs in evaluation order.
    fn field_inputs(&self) -> Vec<(Field, Option<&FieldInput>)> {
        vec![
            (Field::SaleId, self.sale_id.as_ref()),
            (Field::Title, Some(&self.title)),
            (Field::Summary, Some(&self.summary)),
            (Field::Image, Some(&self.image)),
            (Field::Url, Some(&self.url)),
            (Field::PriceFull, Some(&self.price_full)),
            (Field::PriceDiscount, self.price_discount.as_ref()),
            (Field::Rating, self.rating.as_ref()),
            (Field::RatingTop, self.rating_top.as_ref()),
            (Field::AvailablePercentage, self.available_percentage.as_ref()),
            (Field::AvailableTotal, self.available_total.as_ref()),
            (Field::AvailableSold, self.available_sold.as_ref()),
            (Field::AvailableStill, self.available_still.as_ref()),
        ]
    }

    /// Normalize every field into a driver chain and check that templates
    /// only reference fields evaluated before them.
    pub fn build(&self) -> Result<OfferParser> {
        Url::parse(&self.scrape_url)
            .map_err(|e| Error::Schema(format!("{}: invalid scrape_url {:?}: {}", self.offer_id, self.scrape_url, e)))?;

        let mut known: HashSet<&str> = ["retailer_name", "offer_id", "scrape_url"].into_iter().collect();
        let mut fields = Vec::new();

        for (field, input) in self.field_inputs() {
            let Some(input) = input else { continue };
            let chain = input_to_chain(input)
                .map_err(|e| Error::Schema(format!("{}.{}: {}", self.offer_id, field.as_str(), e)))?;
            check_references(&chain, &known)
                .map_err(|e| Error::Schema(format!("{}.{}: {}", self.offer_id, field.as_str(), e)))?;
            known.insert(field.as_str());
            fields.push((field, chain));
        }

        Ok(OfferParser::new(
            self.retailer_name.clone(),
            self.offer_id.clone(),
            self.scrape_url.clone(),
            self.schedule,
            fields,
        ))
    }
}

impl TryFrom<&OfferSchema> for OfferParser {
    type Error = Error;

    fn try_from(schema: &OfferSchema) -> Result<Self> {
        schema.build()
    }
}

fn check_references(chain: &Chain, known: &HashSet<&str>) -> std::result::Result<(), String> {
    for driver in chain.drivers() {
        let (template, allows_input) = match &driver.kind {
            DriverKind::Format(template) => (template, false),
            DriverKind::Math(template) => (template, true),
            _ => continue,
        };
        for name in template.fields() {
            if !(known.contains(name) || (allows_input && name == "input")) {
                return Err(format!(
                    "{:?} references {:?}, which is not evaluated before it",
                    template.source(),
                    name
                ));
            }
        }
    }
    Ok(())
}

fn input_to_chain(input: &FieldInput) -> std::result::Result<Chain, String> {
    let drivers = match input {
        FieldInput::Literal(literal) => literal_to_chain(literal)?,
        FieldInput::Driver(spec) => vec![build_driver(spec)?],
        FieldInput::Chain(items) => {
            let mut drivers = Vec::new();
            for item in items {
                match item {
                    ChainItem::Driver(spec) => drivers.push(build_driver(spec)?),
                    ChainItem::Literal(literal) => drivers.extend(literal_to_chain(literal)?),
                }
            }
            drivers
        }
    };
    Ok(Chain::new(drivers))
}

/// Strings are CSS queries; numbers become a constant cast back to their type.
pub fn literal_to_chain(literal: &Literal) -> std::result::Result<Vec<Driver>, String> {
    match literal {
        Literal::Text(query) => Ok(vec![html_driver(query, None)?]),
        Literal::Int(i) => Ok(vec![
            Driver::new(DriverKind::String(Value::Int(*i).to_string())),
            Driver::new(DriverKind::Cast(CastTarget::Int)),
        ]),
        Literal::Float(v) => Ok(vec![
            Driver::new(DriverKind::String(Value::Float(*v).to_string())),
            Driver::new(DriverKind::Cast(CastTarget::Float)),
        ]),
    }
}

fn html_driver(query: &str, attribute: Option<String>) -> std::result::Result<Driver, String> {
    let selector = parse_selector(query).map_err(|e| e.to_string())?;
    Ok(Driver::new(DriverKind::Html {
        selector,
        query: query.to_string(),
        attribute,
    }))
}

fn build_driver(spec: &DriverSpec) -> std::result::Result<Driver, String> {
    let mut driver = match &spec.kind {
        DriverKindSpec::String { string } => Driver::new(DriverKind::String(string.clone())),
        DriverKindSpec::Html { query, attribute } => html_driver(query, attribute.clone())?,
        DriverKindSpec::Format { format } => Driver::new(DriverKind::Format(Template::parse(format)?)),
        DriverKindSpec::Regex { regex, method, group_index, join_groups } => Driver::new(DriverKind::Regex {
            regex: Regex::new(regex).map_err(|e| format!("invalid regex {:?}: {}", regex, e))?,
            method: match method {
                RegexMethodSpec::FindAll => RegexMethod::FindAll,
                RegexMethodSpec::Search => RegexMethod::Search,
            },
            group_index: *group_index,
            join: join_groups.clone(),
        }),
        DriverKindSpec::Cast { target } => Driver::new(DriverKind::Cast(match target {
            CastTargetSpec::Float => CastTarget::Float,
            CastTargetSpec::Int => CastTarget::Int,
            CastTargetSpec::Str => CastTarget::Str,
        })),
        DriverKindSpec::Math { equation } => Driver::new(DriverKind::Math(Template::parse(equation)?)),
        DriverKindSpec::Money { currency, shorten, prepend_currency } => Driver::new(DriverKind::Money {
            currency: currency.clone(),
            shorten: *shorten,
            prepend: *prepend_currency,
        }),
    };
    driver.ignore_errors = spec.ignore_errors;
    Ok(driver)
}
