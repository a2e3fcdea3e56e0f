use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use scraper::{ElementRef, Html, Selector};
use unicode_normalization::UnicodeNormalization;
use std::collections::HashSet;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)\p{L}[\p{L}\p{N}_']*").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref TITLE: Selector = Selector::parse("title").expect("valid selector");
    static ref BODY: Selector = Selector::parse("body").expect("valid selector");
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a", "about", "above", "after", "again", "against", "all", "am",
            "an", "and", "any", "are", "aren't", "as", "at", "be", "because", "been", "before",
            "being", "below", "between", "both", "but", "by", "can", "can't", "cannot", "could",
            "couldn't", "did", "didn't", "do", "does", "doesn't", "doing", "don't", "down",
            "during", "each", "few", "for", "from", "further", "had", "hadn't", "has", "hasn't",
            "have", "haven't", "having", "he", "he'd", "he'll", "he's", "her", "here", "here's",
            "hers", "herself", "him", "himself", "his", "how", "how's", "i", "i'd", "i'll", "i'm",
            "i've", "if", "in", "into", "is", "isn't", "it", "it's", "its", "itself", "let's", "me",
            "more", "most", "mustn't", "my", "myself", "no", "nor", "not", "of", "off", "on",
            "once", "only", "or", "other", "ought", "our", "ours", "ourselves", "out", "over",
            "own", "same", "she", "she'd", "she'll", "she's", "should", "shouldn't", "so", "some",
            "such", "than", "that", "that's", "the", "their", "theirs", "them", "themselves",
            "then", "there", "there's", "these", "they", "they'd", "they'll", "they're", "they've",
            "this", "those", "through", "to", "too", "under", "until", "up", "very", "was",
            "wasn't", "we", "we'd", "we'll", "we're", "we've", "were", "weren't", "what", "what's",
            "when", "when's", "where", "where's", "which", "while", "who", "who's", "whom", "why",
            "why's", "with", "won't", "would", "wouldn't", "you", "you'd", "you'll", "you're",
            "you've", "your", "yours", "yourself", "yourselves",
        ];
        words.iter().copied().collect()
    };
}

fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// Tokenize text into terms using NFKC normalization, lowercase, stopword removal, and stemming.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    let mut tokens = Vec::new();
    for mat in RE.find_iter(&normalized) {
        let token = mat.as_str();
        if is_stopword(token) { continue; }
        tokens.push(STEMMER.stem(token).to_string());
    }
    tokens
}

/// Turns raw document content into the ordered stream of index terms.
pub trait DocumentProcessor {
    /// `None` means the document yields nothing indexable.
    fn process_text(&self, raw: &str) -> Option<Vec<String>>;
}

/// Tokenizes content as plain text.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextProcessor;

impl DocumentProcessor for PlainTextProcessor {
    fn process_text(&self, raw: &str) -> Option<Vec<String>> {
        terms_of(raw)
    }
}

/// Extracts the visible title and body text of an HTML page, then tokenizes it.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlProcessor;

impl HtmlProcessor {
    pub fn extract_text(raw: &str) -> String {
        let doc = Html::parse_document(raw);
        let title = doc.select(&TITLE).next().map(visible_text).unwrap_or_default();
        let body = visible_text(doc.select(&BODY).next().unwrap_or_else(|| doc.root_element()));
        format!("{title} {body}")
    }
}

/// Text nodes under `el`, skipping script and style contents.
fn visible_text(el: ElementRef) -> String {
    el.descendants()
        .filter_map(|node| {
            let text: &str = node.value().as_text()?;
            let parent = node.parent()?.value().as_element()?.name();
            (!matches!(parent, "script" | "style" | "noscript")).then_some(text)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

impl DocumentProcessor for HtmlProcessor {
    fn process_text(&self, raw: &str) -> Option<Vec<String>> {
        terms_of(&Self::extract_text(raw))
    }
}

/// Content format of a collection, selecting the processor to use.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    #[default]
    Html,
    PlainText,
}

impl DocumentProcessor for DocumentFormat {
    fn process_text(&self, raw: &str) -> Option<Vec<String>> {
        match self {
            DocumentFormat::Html => HtmlProcessor.process_text(raw),
            DocumentFormat::PlainText => PlainTextProcessor.process_text(raw),
        }
    }
}

fn terms_of(text: &str) -> Option<Vec<String>> {
    let terms = tokenize(text);
    if terms.is_empty() { None } else { Some(terms) }
}
