//! Phrase-level speech synthesis
//!
//! Text is split into short phrases, each phrase is synthesized (or served
//! from the shared [`PhraseCache`]) concurrently, and the MP3 segments are
//! concatenated back in phrase order into a single data URL.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use tutor_config::{constants::speech, SpeechSettings};
use tutor_core::{decode_data_url, encode_mp3_data_url, Error, Result, TextToSpeech};

use crate::cache::{normalize_key, PhraseCache};

/// Punctuation followed by whitespace; the punctuation mark is kept as its own fragment
static PHRASE_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"([,.!?])\s+").unwrap());

/// Split text into fragments at phrase boundaries, then greedily pack
/// adjacent fragments (joined by one space) up to `max_chars`.
///
/// A fragment longer than `max_chars` on its own is emitted unsplit.
pub fn split_into_phrases(text: &str, max_chars: usize) -> Vec<String> {
    let mut fragments: Vec<&str> = Vec::new();
    let mut last = 0;
    for caps in PHRASE_BOUNDARY.captures_iter(text) {
        let (Some(whole), Some(mark)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        fragments.push(&text[last..whole.start()]);
        fragments.push(mark.as_str());
        last = whole.end();
    }
    fragments.push(&text[last..]);

    let mut phrases = Vec::new();
    let mut current = String::new();
    for fragment in fragments {
        if fragment.trim().is_empty() {
            continue;
        }

        let joined_len = current.chars().count() + 1 + fragment.chars().count();
        if joined_len > max_chars && !current.is_empty() {
            phrases.push(current.trim().to_string());
            current = fragment.to_string();
        } else if current.is_empty() {
            current = fragment.to_string();
        } else {
            current.push(' ');
            current.push_str(fragment);
        }
    }

    if !current.trim().is_empty() {
        phrases.push(current.trim().to_string());
    }

    phrases
}

/// Concatenate MP3 data URLs into one; falls back to the first segment
/// if any segment fails to decode.
pub fn concatenate_segments(segments: &[String]) -> String {
    match try_concatenate(segments) {
        Ok(audio) => audio,
        Err(e) => {
            tracing::warn!(error = %e, segments = segments.len(), "Audio concatenation failed, using first segment");
            segments.first().cloned().unwrap_or_default()
        }
    }
}

fn try_concatenate(segments: &[String]) -> Result<String> {
    let mut bytes = Vec::new();
    for segment in segments {
        bytes.extend(decode_data_url(segment)?);
    }
    Ok(encode_mp3_data_url(&bytes))
}

#[derive(Debug, Clone)]
pub struct SpeechConfig {
    pub max_phrase_chars: usize,
    /// Encoded entries at or above this length are not cached
    pub max_cached_entry_bytes: usize,
    pub tts_timeout: Duration,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            max_phrase_chars: speech::MAX_PHRASE_CHARS,
            max_cached_entry_bytes: speech::MAX_CACHED_ENTRY_BYTES,
            tts_timeout: Duration::from_millis(tutor_config::constants::timeouts::TTS_MS),
        }
    }
}

impl SpeechConfig {
    pub fn from_settings(speech: &SpeechSettings, tts_timeout: Duration) -> Self {
        Self {
            max_phrase_chars: speech.max_phrase_chars,
            max_cached_entry_bytes: speech.max_cached_entry_bytes,
            tts_timeout,
        }
    }
}

/// Text → single MP3 data URL, with phrase caching
pub struct SpeechSynthesizer {
    tts: Arc<dyn TextToSpeech>,
    cache: Arc<PhraseCache>,
    config: SpeechConfig,
}

impl SpeechSynthesizer {
    pub fn new(tts: Arc<dyn TextToSpeech>, cache: Arc<PhraseCache>, config: SpeechConfig) -> Self {
        Self { tts, cache, config }
    }

    pub fn cache(&self) -> &Arc<PhraseCache> {
        &self.cache
    }

    /// Audio for one phrase, or `""` on failure
    pub async fn synthesize_phrase(&self, phrase: &str) -> String {
        match self.try_synthesize_phrase(phrase).await {
            Ok(audio) => audio,
            Err(e) => {
                tracing::warn!(error = %e, kind = e.kind(), phrase, "Phrase synthesis failed");
                String::new()
            }
        }
    }

    async fn try_synthesize_phrase(&self, phrase: &str) -> Result<String> {
        let key = normalize_key(phrase);
        if let Some(audio) = self.cache.get(&key) {
            tracing::debug!(phrase = %key, "Phrase cache hit");
            return Ok(audio);
        }
        tracing::debug!(phrase = %key, "Phrase cache miss");

        let bytes = tokio::time::timeout(self.config.tts_timeout, self.tts.synthesize(phrase))
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "speech synthesis after {}ms",
                    self.config.tts_timeout.as_millis()
                ))
            })??;

        if bytes.is_empty() {
            return Err(Error::Tts("upstream returned no audio".to_string()));
        }

        let audio = encode_mp3_data_url(&bytes);
        if audio.len() < self.config.max_cached_entry_bytes {
            self.cache.put(key, audio.clone());
        } else {
            tracing::debug!(bytes = audio.len(), "Phrase audio too large to cache");
        }

        Ok(audio)
    }

    /// Audio for a whole text, or `""` if no phrase could be synthesized
    pub async fn synthesize(&self, text: &str) -> String {
        let start = Instant::now();
        let phrases = split_into_phrases(text, self.config.max_phrase_chars);

        // join_all yields results in phrase order whatever the completion order
        let results = join_all(phrases.iter().map(|p| self.synthesize_phrase(p))).await;
        let mut segments: Vec<String> = results.into_iter().filter(|a| !a.is_empty()).collect();
        let segment_count = segments.len();

        let audio = match segment_count {
            0 => {
                tracing::error!(phrases = phrases.len(), "No audio generated for any phrase");
                return String::new();
            }
            1 => segments.swap_remove(0),
            _ => concatenate_segments(&segments),
        };

        tracing::debug!(
            phrases = phrases.len(),
            segments = segment_count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Speech synthesis completed"
        );
        audio
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        tracing::info!("Phrase audio cache cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// "Audio" is the phrase's own bytes; phrases containing "fail" error out
    struct EchoTts {
        calls: Mutex<Vec<String>>,
        delay_first: Option<Duration>,
    }

    impl EchoTts {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                delay_first: None,
            }
        }
    }

    #[async_trait]
    impl TextToSpeech for EchoTts {
        async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
            let first = {
                let mut calls = self.calls.lock();
                calls.push(text.to_string());
                calls.len() == 1
            };
            if first {
                if let Some(delay) = self.delay_first {
                    tokio::time::sleep(delay).await;
                }
            }
            if text.contains("fail") {
                return Err(Error::Tts("boom".to_string()));
            }
            Ok(text.as_bytes().to_vec())
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    fn synthesizer(tts: Arc<EchoTts>, max_phrase_chars: usize) -> SpeechSynthesizer {
        SpeechSynthesizer::new(
            tts,
            Arc::new(PhraseCache::new(100)),
            SpeechConfig {
                max_phrase_chars,
                ..Default::default()
            },
        )
    }

    fn strip_ws(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn test_split_reproduces_input() {
        let text = "Hello, world. How are you?";
        let phrases = split_into_phrases(text, 50);
        assert!(!phrases.is_empty());
        assert_eq!(strip_ws(&phrases.concat()), strip_ws(text));
        assert!(phrases.iter().all(|p| p.chars().count() <= 50));
    }

    #[test]
    fn test_split_keeps_punctuation_fragments() {
        assert_eq!(
            split_into_phrases("Hello, world. How are you?", 50),
            vec!["Hello , world . How are you?"]
        );
    }

    #[test]
    fn test_split_packs_up_to_limit() {
        let text = "I like apples, I like pears. Do you like grapes? Yes I do!";
        let phrases = split_into_phrases(text, 20);
        assert_eq!(strip_ws(&phrases.concat()), strip_ws(text));
        for phrase in &phrases {
            assert!(phrase.chars().count() <= 20, "{phrase:?} too long");
        }
        assert!(phrases.len() > 1);
    }

    #[test]
    fn test_split_long_fragment_emitted_alone() {
        let long = "a".repeat(80);
        let text = format!("Hi, {long}. Bye");
        let phrases = split_into_phrases(&text, 50);
        assert!(phrases.contains(&long));
        assert_eq!(strip_ws(&phrases.concat()), strip_ws(&text));
    }

    #[test]
    fn test_split_blank_text() {
        assert!(split_into_phrases("   ", 50).is_empty());
        assert!(split_into_phrases("", 50).is_empty());
    }

    #[test]
    fn test_split_counts_chars_not_bytes() {
        // 30 Hebrew letters are 60 bytes but fit in a 50-char phrase
        let text = format!("{}, ok", "ש".repeat(30));
        assert_eq!(split_into_phrases(&text, 50).len(), 1);
    }

    #[test]
    fn test_concatenate_falls_back_to_first() {
        let good = encode_mp3_data_url(b"abc");
        let segments = vec![good.clone(), "not a data url".to_string()];
        assert_eq!(concatenate_segments(&segments), good);
    }

    #[tokio::test]
    async fn test_phrase_cached_after_first_call() {
        let tts = Arc::new(EchoTts::new());
        let synth = synthesizer(tts.clone(), 50);

        let first = synth.synthesize_phrase("Hello there").await;
        let second = synth.synthesize_phrase("  HELLO THERE ").await;

        assert_eq!(first, second);
        assert_eq!(tts.calls.lock().len(), 1);
        assert_eq!(decode_data_url(&first).unwrap(), b"Hello there");
        assert_eq!(synth.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_large_entries_not_cached() {
        let tts = Arc::new(EchoTts::new());
        let synth = SpeechSynthesizer::new(
            tts.clone(),
            Arc::new(PhraseCache::new(10)),
            SpeechConfig {
                max_cached_entry_bytes: 10,
                ..Default::default()
            },
        );

        let audio = synth.synthesize_phrase("a phrase").await;
        assert!(!audio.is_empty());
        assert!(synth.cache().is_empty());
    }

    #[tokio::test]
    async fn test_failure_yields_empty_and_is_not_cached() {
        let tts = Arc::new(EchoTts::new());
        let synth = synthesizer(tts, 50);
        assert_eq!(synth.synthesize_phrase("please fail").await, "");
        assert!(synth.cache().is_empty());
    }

    #[tokio::test]
    async fn test_single_phrase_matches_phrase_synthesis() {
        let tts = Arc::new(EchoTts::new());
        let synth = synthesizer(tts, 50);
        let whole = synth.synthesize("Good morning").await;
        let phrase = synth.synthesize_phrase("Good morning").await;
        assert_eq!(whole, phrase);
    }

    #[tokio::test]
    async fn test_multi_phrase_concatenated_in_order() {
        let tts = Arc::new(EchoTts {
            calls: Mutex::new(Vec::new()),
            delay_first: Some(Duration::from_millis(30)),
        });
        let synth = synthesizer(tts, 12);

        let text = "One two three, four five six. Seven eight nine!";
        let phrases = split_into_phrases(text, 12);
        assert!(phrases.len() > 2);

        let audio = synth.synthesize(text).await;
        let decoded = decode_data_url(&audio).unwrap();
        let expected: Vec<u8> = phrases.iter().flat_map(|p| p.bytes()).collect();
        assert_eq!(decoded, expected);
    }

    #[tokio::test]
    async fn test_failed_phrases_dropped() {
        let tts = Arc::new(EchoTts::new());
        let synth = synthesizer(tts, 12);

        let audio = synth.synthesize("we will fail, then okay.").await;
        let decoded = String::from_utf8(decode_data_url(&audio).unwrap()).unwrap();
        assert!(!decoded.contains("fail"));
        assert!(decoded.contains("okay"));
    }

    #[tokio::test]
    async fn test_all_failures_yield_empty() {
        let tts = Arc::new(EchoTts::new());
        let synth = synthesizer(tts, 50);
        assert_eq!(synth.synthesize("fail").await, "");
        assert_eq!(synth.synthesize("").await, "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_upstream_times_out() {
        struct SlowTts;

        #[async_trait]
        impl TextToSpeech for SlowTts {
            async fn synthesize(&self, _text: &str) -> Result<Vec<u8>> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(vec![1])
            }

            fn model_name(&self) -> &str {
                "slow"
            }
        }

        let synth = SpeechSynthesizer::new(
            Arc::new(SlowTts),
            Arc::new(PhraseCache::new(10)),
            SpeechConfig {
                tts_timeout: Duration::from_secs(1),
                ..Default::default()
            },
        );
        assert_eq!(synth.synthesize_phrase("hello").await, "");
    }

    #[tokio::test]
    async fn test_clear_cache() {
        let tts = Arc::new(EchoTts::new());
        let synth = synthesizer(tts.clone(), 50);
        synth.synthesize_phrase("hi").await;
        synth.clear_cache();
        synth.synthesize_phrase("hi").await;
        assert_eq!(tts.calls.lock().len(), 2);
    }
}
