//! Domain text normalisation.
//!
//! Applies an ordered table of case-insensitive rewrite rules to raw product
//! text: punctuation is padded with spaces so tokenisation treats it
//! uniformly, domain abbreviations are expanded to canonical full words, and
//! filler words are deleted. Numeric-unit rules deliberately discard the
//! quantity and keep only the unit's semantic class ("500 ml" becomes
//! "liter"); that lossy behaviour matches the model's training data and must
//! not be "improved".
//!
//! The table runs twice because some rules produce token sequences matched
//! by earlier rules; after the second pass the text is a fixed point.

use regex::RegexBuilder;
use std::borrow::Cow;
use std::sync::LazyLock;

/// One pattern → replacement rewrite rule, matched case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizationRule {
    /// Regular expression matched against the lowercased text.
    pub pattern: &'static str,
    /// Literal replacement text.
    pub replacement: &'static str,
}

const fn rule(pattern: &'static str, replacement: &'static str) -> NormalizationRule {
    NormalizationRule {
        pattern,
        replacement,
    }
}

/// The ordered rewrite table. Order matters: later rules operate on text
/// produced by earlier rules.
pub const RULES: &[NormalizationRule] = &[
    // Punctuation padding
    rule(r"\(", " ( "),
    rule(r"\)", " ) "),
    rule(r"\.", " . "),
    rule(r"\!", " ! "),
    rule(r"\?", " ? "),
    rule(r"\:", " : "),
    rule(r"\,", ", "),
    // Baby care
    rule(r"\b(\d+)\s*[-~to]?\s*(\d+)\s*(m|mth|mths|month|months?)\b", "month"),
    rule(r"\bnewborn\s*[-~to]?\s*(\d+)\s*(m|mth|months?)\b", "month"),
    rule(r"\b(nb|newborn|baby|bb|bby|babie|babies)\b", "baby"),
    rule(r"\b(diaper|diapr|nappy)\b", "diaper"),
    rule(r"\b(stroller|pram|buggy)\b", "stroller"),
    rule(r"\b(bpa\s*free|non\s*bpa)\b", "bisphenol A free"),
    rule(r"\b(\d+)\s*(oz|ounce)\b", "ounce"),
    // Computer hardware
    rule(r"\b(rtx\s*\d+)\b", "ray tracing graphics"),
    rule(r"\b(gtx\s*\d+)\b", "geforce graphics"),
    rule(r"\bnvidia\b", "nvidia"),
    rule(r"\b(amd\s*radeon\s*rx\s*\d+)\b", "amd radeon graphics"),
    rule(r"\b(intel\s*(core|xeon)\s*[i\d-]+)\b", "intel processor"),
    rule(r"\b(amd\s*ryzen\s*[\d]+)\b", "amd ryzen processor"),
    rule(r"\bssd\b", "solid state drive"),
    rule(r"\bhdd\b", "hard disk drive"),
    rule(r"\bwifi\s*([0-9])\b", "wi-fi standard"),
    rule(r"\bbluetooth\s*(\d\.\d)\b", "bluetooth version"),
    rule(r"\bethernet\b", "ethernet"),
    rule(r"\bfhd\b", "full high definition"),
    rule(r"\buhd\b", "ultra high definition"),
    rule(r"\bqhd\b", "quad high definition"),
    rule(r"\boled\b", "organic light emitting diode"),
    rule(r"\bips\b", "in-plane switching"),
    rule(r"\bram\b", "random access memory"),
    rule(r"\bcpu\b", "central processing unit"),
    rule(r"\bgpu\b", "graphics processing unit"),
    rule(r"\bhdmi\b", "high definition multimedia interface"),
    rule(r"\busb\s*([a-z0-9]*)\b", "universal serial bus"),
    rule(r"\brgb\b", "red green blue"),
    // Home appliances
    rule(r"\bfridge\b", "refrigerator"),
    rule(r"\bwashing\s*machine\b", "clothes washer"),
    rule(r"\bdishwasher\b", "dish washing machine"),
    rule(r"\boven\b", "cooking oven"),
    rule(r"\bmicrowave\b", "microwave oven"),
    rule(r"\bhoover\b", "vacuum cleaner"),
    rule(r"\btumble\s*dryer\b", "clothes dryer"),
    rule(r"\b(a\+)\b", "energy efficiency class"),
    rule(r"\b(\d+)\s*btu\b", "british thermal unit"),
    // Textiles and materials
    rule(r"\bpoly\b", "polyester"),
    rule(r"\bacrylic\b", "acrylic fiber"),
    rule(r"\bnylon\b", "nylon fiber"),
    rule(r"\bspandex\b", "spandex fiber"),
    rule(r"\blycra\b", "lycra fiber"),
    rule(r"\bpvc\b", "polyvinyl chloride"),
    rule(r"\bvinyl\b", "vinyl material"),
    rule(r"\bstainless\s*steel\b", "stainless steel"),
    rule(r"\baluminum\b", "aluminum metal"),
    rule(r"\bplexiglass\b", "acrylic glass"),
    rule(r"\bpu\s*leather\b", "polyurethane leather"),
    rule(r"\bsynthetic\s*leather\b", "synthetic leather"),
    rule(r"\bfaux\s*leather\b", "faux leather"),
    rule(r"\bwaterproof\b", "water resistant"),
    rule(r"\bbreathable\b", "air permeable"),
    rule(r"\bwrinkle-free\b", "wrinkle resistant"),
    // Beauty and personal care. Replacement capitalisation carries through
    // to the output because only the input is lowercased.
    rule(r"\bSPF\b", "Sun Protection Factor"),
    rule(r"\bUV\b", "Ultraviolet"),
    rule(r"\bBB\s*cream\b", "Blemish Balm cream"),
    rule(r"\bCC\s*cream\b", "Color Correcting cream"),
    rule(r"\bHA\b", "Hyaluronic Acid"),
    rule(r"\bAHA\b", "Alpha Hydroxy Acid"),
    rule(r"\bBHA\b", "Beta Hydroxy Acid"),
    rule(r"\bPHA\b", "Polyhydroxy Acid"),
    rule(r"\bNMF\b", "Natural Moisturizing Factor"),
    rule(r"\bEGF\b", "Epidermal Growth Factor"),
    rule(r"\bVit\s*C\b", "Vitamin C"),
    rule(r"\bVit\s*E\b", "Vitamin E"),
    rule(r"\bVit\s*B3\b", "Niacinamide Vitamin B3"),
    rule(r"\bVit\s*B5\b", "Panthenol Vitamin B5"),
    rule(r"\bSOD\b", "Superoxide Dismutase"),
    rule(r"\bQ10\b", "Coenzyme Q10"),
    rule(r"\bFoam\s*cl\b", "Foam cleanser"),
    rule(r"\bMic\s*H2O\b", "Micellar Water"),
    rule(r"\bToner\b", "Skin toner"),
    rule(r"\bEssence\b", "Skin essence"),
    rule(r"\bAmpoule\b", "Concentrated serum"),
    rule(r"\bCF\b", "Cruelty Free"),
    rule(r"\bPF\b", "Paraben Free"),
    rule(r"\bSF\b", "Sulfate Free"),
    rule(r"\bGF\b", "Gluten Free"),
    rule(r"\bHF\b", "Hypoallergenic Formula"),
    rule(r"\bNT\b", "Non-comedogenic Tested"),
    rule(r"\bAM\b", "morning"),
    rule(r"\bPM\b", "night"),
    rule(r"\bBID\b", "twice daily"),
    rule(r"\bQD\b", "once daily"),
    rule(r"\bAIR\b", "Airless pump bottle"),
    rule(r"\bD-C\b", "Dropper container"),
    rule(r"\bT-C\b", "Tube container"),
    rule(r"\bPDO\b", "Polydioxanone"),
    rule(r"\bPCL\b", "Polycaprolactone"),
    rule(r"\bPLLA\b", "Poly-L-lactic Acid"),
    rule(r"\bHIFU\b", "High-Intensity Focused Ultrasound"),
    rule(r"\b(\d+)\s*fl\s*oz\b", "fluid ounce"),
    rule(r"\bpH\s*bal\b", "pH balanced"),
    // General abbreviations and units
    rule(r"\b(\d+)\s*gb\b", "byte"),
    rule(r"\b(\d+)\s*tb\b", "byte"),
    rule(r"\b(\d+)\s*mb\b", "byte"),
    rule(r"\b(\d+)\s*go\b", "byte"),
    rule(r"\b(\d+)\s*to\b", "byte"),
    rule(r"\b(\d+)\s*mo\b", "byte"),
    rule(r"\boctet\b", "byte"),
    rule(r"\b(\d+)\s*y\b", "year"),
    rule(r"\b(\d+)\s*mth\b", "month"),
    rule(r"\b(\d+)\s*d\b", "day"),
    rule(r"\b(\d+)\s*h\b", "hour"),
    rule(r"\b(\d+)\s*min\b", "minute"),
    rule(r"\b(\d+)\s*rpm\b", "revolution per minute"),
    rule(r"\b(\d+)\s*mw\b", "watt"),
    rule(r"\b(\d+)\s*cw\b", "watt"),
    rule(r"\b(\d+)\s*kw\b", "watt"),
    rule(r"\b(\d+)\s*ma\b", "ampere"),
    rule(r"\b(\d+)\s*ca\b", "ampere"),
    rule(r"\b(\d+)\s*ka\b", "ampere"),
    rule(r"\b(\d+)\s*mv\b", "volt"),
    rule(r"\b(\d+)\s*cv\b", "volt"),
    rule(r"\b(\d+)\s*kv\b", "volt"),
    rule(r"\b(\d+)\s*mm\b", "meter"),
    rule(r"\b(\d+)\s*cm\b", "meter"),
    rule(r"\b(\d+)\s*m\b", "meter"),
    rule(r"\b(\d+)\s*km\b", "meter"),
    rule(r"\binch\b", "meter"),
    rule(r"\b(\d+)\s*ml\b", "liter"),
    rule(r"\b(\d+)\s*cl\b", "liter"),
    rule(r"\b(\d+)\s*dl\b", "liter"),
    rule(r"\b(\d+)\s*l\b", "liter"),
    rule(r"\b(\d+)\s*oz\b", "liter"),
    rule(r"\b(\d+)\s*gal\b", "liter"),
    rule(r"\bounce\b", "liter"),
    rule(r"\bgallon\b", "liter"),
    rule(r"\b(\d+)\s*mg\b", "gram"),
    rule(r"\b(\d+)\s*cg\b", "gram"),
    rule(r"\b(\d+)\s*dg\b", "gram"),
    rule(r"\b(\d+)\s*g\b", "gram"),
    rule(r"\b(\d+)\s*kg\b", "gram"),
    rule(r"\b(\d+)\s*lb\b", "gram"),
    rule(r"\bpound\b", "gram"),
    rule(r"\b(\d+)\s*°c\b", "celsius"),
    // The training data spelt these two "celcius"; keep the quirk.
    rule(r"\b(\d+)\s*°f\b", "celcius"),
    rule(r"\bfahrenheit\b", "celcius"),
    rule(r"\bflipkart\.com\b", ""),
    rule(r"\bapprox\.?\b", "approximately"),
    rule(r"\bw/o\b", "without"),
    rule(r"\bw/\b", "with"),
    rule(r"\bant-\b", "anti"),
    rule(r"\byes\b", ""),
    rule(r"\bno\b", ""),
    rule(r"\bna\b", ""),
    rule(r"\brs\.?\b", ""),
    // Whitespace collapse keeps each pass a fixed point of the padding rules
    rule(r"\s+", " "),
];

/// Rule table compiled once per process.
static COMPILED: LazyLock<Vec<(regex::Regex, &'static str)>> = LazyLock::new(|| {
    RULES
        .iter()
        .map(|r| {
            #[expect(clippy::expect_used, reason = "rule table patterns are constant and valid")]
            let re = RegexBuilder::new(r.pattern)
                .case_insensitive(true)
                .build()
                .expect("valid rule pattern");
            (re, r.replacement)
        })
        .collect()
});

/// Number of passes over the rule table per call.
const PASSES: usize = 2;

/// Applies the rewrite table to raw product text.
///
/// Pure and infallible: malformed or empty input degrades to an empty
/// string rather than raising.
///
/// # Examples
///
/// ```
/// use product_lens::TextNormalizer;
///
/// let normalizer = TextNormalizer::default();
/// let out = normalizer.normalize("500ml waterproof SSD storage case");
/// assert_eq!(out, "liter water resistant solid state drive storage case");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TextNormalizer;

impl TextNormalizer {
    /// Create a normaliser backed by the shared compiled rule table.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Lowercase `raw` and run the rewrite table [`PASSES`] times.
    #[must_use]
    pub fn normalize(&self, raw: &str) -> String {
        let mut text = raw.to_lowercase();
        for _ in 0..PASSES {
            text = apply_rules(&text);
        }
        text.trim().to_owned()
    }
}

/// One sequential pass of every rule over `text`.
fn apply_rules(text: &str) -> String {
    let mut out = text.to_owned();
    for (re, replacement) in COMPILED.iter() {
        if let Cow::Owned(replaced) = re.replace_all(&out, *replacement) {
            out = replaced;
        }
    }
    out
}
