//! Symbol set, style and label declarations
//!
//! A small mapfile-like text format:
//!
//! ```text
//! SYMBOLSET
//!   FONTSET
//!     FONT "sans" "fonts/DejaVuSans.ttf"
//!   END
//!   SYMBOL
//!     NAME "circle"
//!     TYPE ELLIPSE
//!     FILLED TRUE
//!     POINTS 1 1 END
//!   END
//! END
//!
//! STYLE
//!   SYMBOL "circle"
//!   COLOR 255 0 0
//!   SIZE 8
//! END
//! ```
//!
//! Keywords are case-insensitive. Styles refer to symbols by name or index
//! and must come after the symbol set that defines them.

use std::str::FromStr;

use camino::Utf8Path;
use miette::{NamedSource, SourceSpan};
use pest::Parser;
use pest::error::InputLocation;
use pest::iterators::{Pair, Pairs};

use crate::errors::ConfigError;
use crate::log::debug;
use crate::symbol::{
    EllipseSymbol, HatchSymbol, LabelDef, LineCap, LineJoin, PixmapSymbol, SimpleSymbol, StyleDef,
    Symbol, SymbolSet, TruetypeSymbol, VectorSymbol,
};
use crate::types::{Angle, Color};
use crate::{ConfigParser, Rule};

/// Everything declared in one configuration source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub symbols: SymbolSet,
    pub styles: Vec<StyleDef>,
    pub labels: Vec<LabelDef>,
}

impl Config {
    pub fn parse(source: &str) -> Result<Config, ConfigError> {
        Self::parse_named("<input>", source)
    }

    /// Parse `source`, naming it `name` in error reports.
    pub fn parse_named(name: &str, source: &str) -> Result<Config, ConfigError> {
        let ctx = Input { name, text: source };
        let pairs = ConfigParser::parse(Rule::config, source).map_err(|e| syntax_error(&ctx, e))?;

        let mut config = Config::default();
        for pair in pairs {
            if pair.as_rule() != Rule::config {
                continue;
            }
            for block in pair.into_inner() {
                match block.as_rule() {
                    Rule::symbolset => parse_symbolset(&ctx, block, &mut config.symbols)?,
                    Rule::style => config.styles.push(parse_style(&ctx, block, &config.symbols)?),
                    Rule::label => config.labels.push(parse_label(&ctx, block)?),
                    _ => {}
                }
            }
        }
        debug!(
            symbols = config.symbols.len(),
            styles = config.styles.len(),
            labels = config.labels.len(),
            "parsed configuration"
        );
        Ok(config)
    }

    pub fn load(path: &Utf8Path) -> Result<Config, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::parse_named(path.as_str(), &source)
    }
}

/// Configuration text and the name it is reported under.
struct Input<'s> {
    name: &'s str,
    text: &'s str,
}

impl Input<'_> {
    fn report(&self) -> NamedSource<String> {
        NamedSource::new(self.name, self.text.to_string())
    }
}

fn syntax_error(ctx: &Input<'_>, err: pest::error::Error<Rule>) -> ConfigError {
    let (offset, len) = match err.location {
        InputLocation::Pos(pos) => (pos, 0),
        InputLocation::Span((start, end)) => (start, end - start),
    };
    ConfigError::Syntax {
        message: err.variant.message().to_string(),
        src: ctx.report(),
        span: (offset, len).into(),
    }
}

fn span_of(pair: &Pair<Rule>) -> SourceSpan {
    let span = pair.as_span();
    (span.start(), span.end() - span.start()).into()
}

fn invalid(ctx: &Input<'_>, keyword: &str, message: impl Into<String>, span: SourceSpan) -> ConfigError {
    ConfigError::InvalidValue {
        keyword: keyword.to_string(),
        message: message.into(),
        src: ctx.report(),
        span,
    }
}

/// Contents of a quoted string, without the quotes.
fn string_of(pair: &Pair<Rule>) -> String {
    pair.clone()
        .into_inner()
        .next()
        .map(|inner| inner.as_str().to_string())
        .unwrap_or_default()
}

/// The values following one keyword.
struct Values<'a, 'i> {
    ctx: &'a Input<'a>,
    keyword: String,
    span: SourceSpan,
    inner: Pairs<'i, Rule>,
}

impl<'a, 'i> Values<'a, 'i> {
    fn new(ctx: &'a Input<'a>, pair: Pair<'i, Rule>) -> Self {
        let keyword = pair
            .as_str()
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();
        Values {
            ctx,
            keyword,
            span: span_of(&pair),
            inner: pair.into_inner(),
        }
    }

    fn invalid(&self, message: impl Into<String>) -> ConfigError {
        invalid(self.ctx, &self.keyword, message, self.span)
    }

    fn next(&mut self) -> Result<Pair<'i, Rule>, ConfigError> {
        self.inner.next().ok_or_else(|| self.invalid("missing value"))
    }

    fn number(&mut self) -> Result<f64, ConfigError> {
        let pair = self.next()?;
        pair.as_str()
            .parse::<f64>()
            .map_err(|_| invalid(self.ctx, &self.keyword, "not a number", span_of(&pair)))
    }

    fn non_negative(&mut self) -> Result<f64, ConfigError> {
        let value = self.number()?;
        if value < 0.0 {
            return Err(self.invalid("must not be negative"));
        }
        Ok(value)
    }

    fn integer(&mut self) -> Result<i64, ConfigError> {
        let value = self.number()?;
        if value.fract() != 0.0 {
            return Err(self.invalid("expected a whole number"));
        }
        Ok(value as i64)
    }

    fn pair(&mut self) -> Result<(f64, f64), ConfigError> {
        Ok((self.number()?, self.number()?))
    }

    fn numbers(mut self) -> Result<Vec<f64>, ConfigError> {
        let mut out = Vec::new();
        while self.inner.peek().is_some() {
            out.push(self.number()?);
        }
        Ok(out)
    }

    fn string(&mut self) -> Result<String, ConfigError> {
        Ok(string_of(&self.next()?))
    }

    fn boolean(&mut self) -> Result<bool, ConfigError> {
        Ok(self.next()?.as_str().eq_ignore_ascii_case("true"))
    }

    /// `R G B` with components in 0..=255, or a `"#rrggbb[aa]"` string.
    /// Negative components leave the color unset.
    fn color(&mut self) -> Result<Option<Color>, ConfigError> {
        let value = self.next()?;
        let span = span_of(&value);
        let parts: Vec<Pair<'i, Rule>> = value.into_inner().collect();
        match parts.as_slice() {
            [hex] if hex.as_rule() == Rule::string => Color::from_str(&string_of(hex))
                .map(Some)
                .map_err(|e| invalid(self.ctx, &self.keyword, e.to_string(), span)),
            [r, g, b] => {
                let mut channels = [0u8; 3];
                let mut unset = false;
                for (slot, part) in channels.iter_mut().zip([r, g, b]) {
                    let v = part
                        .as_str()
                        .parse::<f64>()
                        .map_err(|_| invalid(self.ctx, &self.keyword, "not a number", span))?;
                    if v < 0.0 {
                        unset = true;
                    } else if v > 255.0 || v.fract() != 0.0 {
                        return Err(invalid(
                            self.ctx,
                            &self.keyword,
                            "color components are whole numbers from 0 to 255",
                            span_of(part),
                        ));
                    } else {
                        *slot = v as u8;
                    }
                }
                Ok((!unset).then(|| Color::rgb(channels[0], channels[1], channels[2])))
            }
            _ => Err(invalid(self.ctx, &self.keyword, "expected R G B or a hex color", span)),
        }
    }
}

// ============================================================================
// Symbol sets
// ============================================================================

fn parse_symbolset(ctx: &Input<'_>, pair: Pair<Rule>, symbols: &mut SymbolSet) -> Result<(), ConfigError> {
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::fontset => {
                for entry in inner.into_inner() {
                    let mut v = Values::new(ctx, entry);
                    let alias = v.string()?;
                    let path = v.string()?;
                    symbols.fontset_mut().insert(alias, path);
                }
            }
            Rule::symbol => {
                let symbol = parse_symbol(ctx, inner)?;
                symbols.add(symbol);
            }
            _ => {}
        }
    }
    Ok(())
}

fn parse_symbol(ctx: &Input<'_>, pair: Pair<Rule>) -> Result<Symbol, ConfigError> {
    let span = span_of(&pair);
    let mut name = String::new();
    let mut kind = String::from("VECTOR");
    let mut filled = false;
    let mut points = Vec::new();
    let mut points_span = span;
    let mut image = None;
    let mut font = None;
    let mut character = None;

    for prop in pair.into_inner() {
        let rule = prop.as_rule();
        let mut v = Values::new(ctx, prop);
        match rule {
            Rule::symbol_name => name = v.string()?,
            Rule::symbol_type => kind = v.next()?.as_str().to_ascii_uppercase(),
            Rule::filled => filled = v.boolean()?,
            Rule::points => {
                points_span = v.span;
                points = v.numbers()?;
            }
            Rule::image => image = Some(v.string()?),
            Rule::symbol_font => font = Some(v.string()?),
            Rule::character => character = Some(v.string()?),
            _ => {}
        }
    }

    let symbol = match kind.as_str() {
        "SIMPLE" => SimpleSymbol { name }.into(),
        "VECTOR" => {
            if points.len() % 2 != 0 {
                return Err(invalid(ctx, "POINTS", "odd number of coordinates", points_span));
            }
            let pairs: Vec<(f64, f64)> = points.chunks_exact(2).map(|c| (c[0], c[1])).collect();
            VectorSymbol::from_pairs(name, &pairs, filled).into()
        }
        "ELLIPSE" => {
            let (width, height) = match points.as_slice() {
                [] => (1.0, 1.0),
                [w, h] => (*w, *h),
                _ => return Err(invalid(ctx, "POINTS", "an ellipse takes a width and a height", points_span)),
            };
            EllipseSymbol {
                name,
                width,
                height,
                filled,
            }
            .into()
        }
        "PIXMAP" => {
            let image = image.ok_or_else(|| invalid(ctx, "IMAGE", "pixmap symbol needs an image", span))?;
            PixmapSymbol::new(name, image).into()
        }
        "TRUETYPE" => {
            let font = font.ok_or_else(|| invalid(ctx, "FONT", "truetype symbol needs a font", span))?;
            let character = character.ok_or_else(|| invalid(ctx, "CHARACTER", "truetype symbol needs a character", span))?;
            TruetypeSymbol { name, font, character }.into()
        }
        "HATCH" => HatchSymbol { name }.into(),
        other => return Err(invalid(ctx, "TYPE", format!("unknown symbol type {other}"), span)),
    };
    Ok(symbol)
}

// ============================================================================
// Styles
// ============================================================================

fn parse_style(ctx: &Input<'_>, pair: Pair<Rule>, symbols: &SymbolSet) -> Result<StyleDef, ConfigError> {
    let mut style = StyleDef::default();
    for prop in pair.into_inner() {
        let rule = prop.as_rule();
        let mut v = Values::new(ctx, prop);
        match rule {
            Rule::style_symbol => style.symbol = resolve_symbol(ctx, &mut v, symbols)?,
            Rule::color => style.color = v.color()?,
            Rule::outline_color => style.outline_color = v.color()?,
            Rule::background_color => style.background_color = v.color()?,
            Rule::size => style.size = Some(v.non_negative()?),
            Rule::min_size => style.min_size = v.non_negative()?,
            Rule::max_size => style.max_size = v.non_negative()?,
            Rule::width => style.width = v.non_negative()?,
            Rule::min_width => style.min_width = v.non_negative()?,
            Rule::max_width => style.max_width = v.non_negative()?,
            Rule::offset => {
                (style.offset_x, style.offset_y) = v.pair()?;
            }
            Rule::angle => style.angle = Angle(v.number()?),
            Rule::gap => style.gap = v.number()?,
            Rule::pattern => style.pattern = v.numbers()?,
            Rule::line_cap => {
                style.line_cap = match v.next()?.as_str().to_ascii_uppercase().as_str() {
                    "BUTT" => LineCap::Butt,
                    "SQUARE" => LineCap::Square,
                    _ => LineCap::Round,
                }
            }
            Rule::line_join => {
                style.line_join = match v.next()?.as_str().to_ascii_uppercase().as_str() {
                    "MITER" => LineJoin::Miter,
                    "BEVEL" => LineJoin::Bevel,
                    "NONE" => LineJoin::None,
                    _ => LineJoin::Round,
                }
            }
            Rule::line_join_max_size => style.line_join_max_size = v.non_negative()?,
            _ => {}
        }
    }
    Ok(style)
}

/// Symbol index from a quoted name or a number.
fn resolve_symbol(ctx: &Input<'_>, v: &mut Values<'_, '_>, symbols: &SymbolSet) -> Result<usize, ConfigError> {
    let value = v.next()?;
    let span = span_of(&value);
    if value.as_rule() == Rule::string {
        let name = string_of(&value);
        return symbols.index_of(&name).ok_or_else(|| ConfigError::UnknownSymbol {
            name,
            src: ctx.report(),
            span,
        });
    }
    let index = value
        .as_str()
        .parse::<f64>()
        .map_err(|_| invalid(ctx, "SYMBOL", "not a number", span))?;
    if index < 0.0 || index.fract() != 0.0 || index as usize >= symbols.len() {
        return Err(invalid(
            ctx,
            "SYMBOL",
            format!("no symbol with index {index}, the set has {}", symbols.len()),
            span,
        ));
    }
    Ok(index as usize)
}

// ============================================================================
// Labels
// ============================================================================

fn parse_label(ctx: &Input<'_>, pair: Pair<Rule>) -> Result<LabelDef, ConfigError> {
    let mut label = LabelDef::default();
    for prop in pair.into_inner() {
        let rule = prop.as_rule();
        let mut v = Values::new(ctx, prop);
        match rule {
            Rule::label_font => label.font = v.string()?,
            Rule::size => label.size = v.non_negative()?,
            Rule::min_size => label.min_size = v.non_negative()?,
            Rule::max_size => label.max_size = v.non_negative()?,
            Rule::color => label.color = v.color()?,
            Rule::outline_color => label.outline_color = v.color()?,
            Rule::outline_width => label.outline_width = v.non_negative()?,
            Rule::shadow_color => label.shadow_color = v.color()?,
            Rule::shadow_size => label.shadow_offset = v.pair()?,
            Rule::angle => label.angle = Angle(v.number()?),
            Rule::offset => label.offset = v.pair()?,
            Rule::buffer => label.buffer = v.non_negative()?,
            Rule::priority => {
                let priority = v.integer()?;
                label.priority = i32::try_from(priority).map_err(|_| v.invalid("priority out of range"))?;
            }
            Rule::partials => label.partials = v.boolean()?,
            _ => {}
        }
    }
    Ok(label)
}
