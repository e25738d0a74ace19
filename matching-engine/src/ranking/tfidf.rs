//! Bag-of-words TF-IDF vectorizer over unigrams and bigrams.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::OnceLock;

use crate::error::{MatchingError, Result};

/// Common English function words dropped before n-grams are built
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "afterwards", "again", "against", "all", "almost",
    "alone", "along", "already", "also", "although", "always", "am", "among", "amongst", "an",
    "and", "another", "any", "anyhow", "anyone", "anything", "anyway", "anywhere", "are",
    "around", "as", "at", "back", "be", "became", "because", "become", "becomes", "becoming",
    "been", "before", "beforehand", "behind", "being", "below", "beside", "besides", "between",
    "beyond", "both", "but", "by", "can", "cannot", "could", "did", "do", "does", "done", "down",
    "during", "each", "eg", "either", "else", "elsewhere", "enough", "etc", "even", "ever",
    "every", "everyone", "everything", "everywhere", "except", "few", "for", "former",
    "formerly", "from", "further", "had", "has", "have", "he", "hence", "her", "here",
    "hereafter", "hereby", "herein", "hereupon", "hers", "herself", "him", "himself", "his",
    "how", "however", "ie", "if", "in", "indeed", "into", "is", "it", "its", "itself", "just",
    "last", "latter", "latterly", "least", "less", "many", "may", "me", "meanwhile", "might",
    "mine", "more", "moreover", "most", "mostly", "much", "must", "my", "myself", "namely",
    "neither", "never", "nevertheless", "next", "no", "nobody", "none", "noone", "nor", "not",
    "nothing", "now", "nowhere", "of", "off", "often", "on", "once", "one", "only", "onto", "or",
    "other", "others", "otherwise", "our", "ours", "ourselves", "out", "over", "own", "per",
    "perhaps", "please", "rather", "re", "same", "seem", "seemed", "seeming", "seems", "several",
    "she", "should", "since", "so", "some", "somehow", "someone", "something", "sometime",
    "sometimes", "somewhere", "still", "such", "than", "that", "the", "their", "them",
    "themselves", "then", "thence", "there", "thereafter", "thereby", "therefore", "therein",
    "thereupon", "these", "they", "this", "those", "though", "through", "throughout", "thru",
    "thus", "to", "together", "too", "toward", "towards", "under", "until", "up", "upon", "us",
    "very", "via", "was", "we", "well", "were", "what", "whatever", "when", "whence", "whenever",
    "where", "whereafter", "whereas", "whereby", "wherein", "whereupon", "wherever", "whether",
    "which", "while", "whither", "who", "whoever", "whole", "whom", "whose", "why", "will",
    "with", "within", "without", "would", "yet", "you", "your", "yours", "yourself",
    "yourselves",
];

fn stop_words() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOP_WORDS.iter().copied().collect())
}

/// Lowercase word tokens of at least two alphanumeric/underscore characters,
/// with stop words removed.
///
/// "Alphanumeric" is Rust's Unicode `Alphabetic`/`Numeric`, which counts
/// combining vowel signs as word characters: Devanagari `पानी` stays one
/// token instead of splitting at the matra. Signs outside `Other_Alphabetic`
/// (virama, nukta) still split a word.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let stops = stop_words();
    lower
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.chars().count() >= 2 && !stops.contains(*t))
        .map(str::to_string)
        .collect()
}

/// Unigrams followed by bigrams of adjacent tokens
pub fn ngrams(text: &str) -> Vec<String> {
    let tokens = tokenize(text);
    let mut terms = Vec::with_capacity(tokens.len() * 2);
    terms.extend(tokens.iter().cloned());
    terms.extend(tokens.windows(2).map(|pair| format!("{} {}", pair[0], pair[1])));
    terms
}

/// Sparse L2-normalized vector, sorted by term index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    entries: Vec<(usize, f64)>,
}

impl SparseVector {
    pub fn is_zero(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cosine similarity; 0 when either vector has no terms.
    /// Both sides are already unit length so this is a merge-join dot product.
    pub fn cosine(&self, other: &SparseVector) -> f64 {
        let (mut i, mut j) = (0, 0);
        let mut dot = 0.0;
        while i < self.entries.len() && j < other.entries.len() {
            let (ti, wi) = self.entries[i];
            let (tj, wj) = other.entries[j];
            match ti.cmp(&tj) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    dot += wi * wj;
                    i += 1;
                    j += 1;
                }
            }
        }
        dot.clamp(0.0, 1.0)
    }
}

/// A fitted vocabulary with smoothed inverse document frequencies
#[derive(Debug, Clone)]
pub struct TfIdfVectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    documents: usize,
}

impl TfIdfVectorizer {
    /// Learn vocabulary and idf from `corpus`.
    ///
    /// Fails when the corpus yields no terms at all (empty or all stop words).
    pub fn fit<S: AsRef<str>>(corpus: &[S]) -> Result<Self> {
        let mut document_frequency: BTreeMap<String, usize> = BTreeMap::new();
        for doc in corpus {
            let unique: BTreeSet<String> = ngrams(doc.as_ref()).into_iter().collect();
            for term in unique {
                *document_frequency.entry(term).or_insert(0) += 1;
            }
        }

        if document_frequency.is_empty() {
            return Err(MatchingError::Other(
                "empty vocabulary; documents contain only stop words".to_string(),
            ));
        }

        let n = corpus.len() as f64;
        let mut vocabulary = HashMap::with_capacity(document_frequency.len());
        let mut idf = Vec::with_capacity(document_frequency.len());
        // BTreeMap iteration gives alphabetical term indices
        for (index, (term, df)) in document_frequency.into_iter().enumerate() {
            idf.push(((1.0 + n) / (1.0 + df as f64)).ln() + 1.0);
            vocabulary.insert(term, index);
        }

        Ok(Self {
            vocabulary,
            idf,
            documents: corpus.len(),
        })
    }

    pub fn vocabulary_size(&self) -> usize {
        self.idf.len()
    }

    pub fn documents(&self) -> usize {
        self.documents
    }

    /// Weighted, normalized vector for `text`; unknown terms are ignored
    pub fn transform(&self, text: &str) -> SparseVector {
        self.transform_weighted(ngrams(text).into_iter().map(|term| (term, 1.0)))
    }

    /// Normalized vector from precomputed term frequencies. A term listed
    /// twice adds up; unknown terms and non-positive weights are ignored.
    pub fn transform_weighted<I, S>(&self, terms: I) -> SparseVector
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for (term, weight) in terms {
            if weight <= 0.0 {
                continue;
            }
            if let Some(&index) = self.vocabulary.get(term.as_ref()) {
                *counts.entry(index).or_insert(0.0) += weight;
            }
        }

        let mut entries: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(index, tf)| (index, tf * self.idf[index]))
            .collect();

        let norm = entries.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, w) in &mut entries {
                *w /= norm;
            }
        } else {
            entries.clear();
        }

        SparseVector { entries }
    }
}
