use std::sync::OnceLock;

use log::debug;
use regex::{Captures, Regex, RegexBuilder};
use scraper::Selector;

use crate::{errors::ExtractError, models::UnpackedPayload};

const ALPHABET_62: &str = "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// A script block suspected of being P.A.C.K.E.R. packed.
#[derive(Debug, Clone, Copy)]
pub struct PackedScript<'a> {
    source: &'a str,
}

impl<'a> PackedScript<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source }
    }

    pub fn detect(&self) -> bool {
        detect(self.source)
    }

    pub fn unpack(&self) -> impl Iterator<Item = String> + 'a {
        unpack(self.source)
    }
}

impl<'a> From<&'a str> for PackedScript<'a> {
    fn from(source: &'a str) -> Self {
        Self::new(source)
    }
}

pub fn detect(source: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        RegexBuilder::new(r"eval[(]function[(]p,a,c,k,e,[r|d]?")
            .case_insensitive(true)
            .multi_line(true)
            .build()
            .unwrap()
    })
    .is_match(source)
}

/// Unpacks every P.A.C.K.E.R. call found in `source`, lazily.
///
/// Calls whose symbol table does not match the declared count are skipped:
/// substituting into them blindly produces garbage.
pub fn unpack(source: &str) -> impl Iterator<Item = String> + '_ {
    unpack_payloads(source).map(|payload| payload.code)
}

pub fn unpack_payloads(source: &str) -> impl Iterator<Item = UnpackedPayload> + '_ {
    packed_call_re()
        .captures_iter(source)
        .filter_map(|caps| match recover(&caps) {
            Ok(payload) => Some(payload),
            Err(err) => {
                debug!("[packerjs] skipping packed call: {err}");
                None
            }
        })
}

/// Joins all recovered chunks with a single space.
pub fn unpack_and_combine(source: &str) -> Option<String> {
    let chunks: Vec<_> = unpack(source).collect();

    if chunks.is_empty() {
        return None;
    }

    Some(chunks.join(" "))
}

/// Collects packed script bodies from an html page. Pages that inline the
/// packer outside of `<script>` tags are scanned line by line.
pub fn packed_scripts(html: &str) -> Vec<String> {
    static SCRIPT_SELECTOR: OnceLock<Selector> = OnceLock::new();

    let document = scraper::Html::parse_document(html);
    let scripts: Vec<_> = document
        .select(SCRIPT_SELECTOR.get_or_init(|| Selector::parse("script").unwrap()))
        .map(|el| el.text().collect::<String>())
        .filter(|script| detect(script))
        .collect();

    if !scripts.is_empty() {
        return scripts;
    }

    html.lines()
        .filter(|line| detect(line))
        .map(str::to_owned)
        .collect()
}

fn packed_call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        RegexBuilder::new(
            r"\}\s*\(\s*'((?:[^'\\]|\\.)*)'\s*,\s*([^,]*?)\s*,\s*(\d+)\s*,\s*'((?:[^'\\]|\\.)*)'\.split\(\s*'\|'\s*\)",
        )
        .dot_matches_new_line(true)
        .build()
        .unwrap()
    })
}

fn recover(caps: &Captures) -> Result<UnpackedPayload, ExtractError> {
    let (payload, radix, count, symtab) = filter_args(caps)?;

    if count != symtab.len() {
        return Err(ExtractError::UnrecoverablePacking(format!(
            "symtab has {} entries, {count} declared",
            symtab.len()
        )));
    }

    let unbaser = Unbaser::new(radix)
        .ok_or_else(|| ExtractError::UnrecoverablePacking(format!("unsupported radix {radix}")))?;

    Ok(UnpackedPayload {
        code: decode_words(payload, &symtab, &unbaser),
        symbol_count: count,
        radix,
    })
}

fn filter_args<'t>(
    caps: &Captures<'t>,
) -> Result<(&'t str, u32, usize, Vec<&'t str>), ExtractError> {
    let missing = |what: &str| ExtractError::UnrecoverablePacking(format!("no {what} captured"));

    let payload = caps.get(1).ok_or_else(|| missing("payload"))?.as_str();

    // packers sometimes emit an expression or a variable as the radix
    let radix_str = caps.get(2).ok_or_else(|| missing("radix"))?.as_str().trim();
    let radix = match radix_str {
        "[]" => 62,
        s => s.parse::<u32>().unwrap_or(10),
    };

    let count = caps
        .get(3)
        .ok_or_else(|| missing("count"))?
        .as_str()
        .parse::<usize>()
        .map_err(|_| missing("valid count"))?;

    let symtab = caps
        .get(4)
        .ok_or_else(|| missing("symtab"))?
        .as_str()
        .split('|')
        .collect();

    Ok((payload, radix, count, symtab))
}

fn decode_words(payload: &str, symtab: &[&str], unbaser: &Unbaser) -> String {
    static WORD_RE: OnceLock<Regex> = OnceLock::new();

    let sanitized_payload = payload.replace("\\\\", "\\").replace("\\'", "'");

    WORD_RE
        .get_or_init(|| Regex::new(r"(?-u:\b\w+\b)").unwrap())
        .replace_all(&sanitized_payload, |cap: &Captures| {
            let word = &cap[0];
            unbaser
                .unbase(word)
                .and_then(|idx| symtab.get(idx))
                .filter(|sym| !sym.is_empty())
                .map_or_else(|| word.to_owned(), |sym| (*sym).to_owned())
        })
        .into_owned()
}

/// Positional decoder for the packer's numerals, radix 2 to 95.
#[derive(Debug, Clone, Copy)]
pub struct Unbaser {
    radix: u32,
    bucket: usize,
}

impl Unbaser {
    pub fn new(radix: u32) -> Option<Self> {
        let bucket = match radix {
            2..=36 => 36,
            63..=95 => 95,
            55..=62 => 62,
            53..=54 => 54,
            37..=52 => 52,
            _ => return None,
        };

        Some(Self { radix, bucket })
    }

    pub fn unbase(&self, word: &str) -> Option<usize> {
        if self.bucket == 36 {
            return usize::from_str_radix(word, self.radix).ok();
        }

        word.chars()
            .rev()
            .enumerate()
            .try_fold(0usize, |acc, (i, ch)| {
                let weight = (self.radix as usize).checked_pow(i as u32)?;
                acc.checked_add(weight.checked_mul(self.digit(ch)? as usize)?)
            })
    }

    fn digit(&self, ch: char) -> Option<u32> {
        match self.bucket {
            95 => (' '..='~').contains(&ch).then(|| ch as u32 - ' ' as u32),
            n => ALPHABET_62[..n].find(ch).map(|idx| idx as u32),
        }
    }
}
