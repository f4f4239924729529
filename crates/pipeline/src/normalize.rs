//! Text normalization ahead of chunking
//!
//! Strips chat markup the TTS engine would read aloud: Discord mention and
//! emoji tokens become plain words, URLs become a placeholder, markdown
//! decorations are removed, and newlines become sentence breaks so the
//! chunker can split on them.

use once_cell::sync::Lazy;
use regex::Regex;

static CUSTOM_EMOJI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<a?:[A-Za-z0-9_]+:[0-9]+>").expect("emoji pattern"));
static USER_MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"<@!?[0-9]+>").expect("user pattern"));
static CHANNEL_MENTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<#[0-9]+>").expect("channel pattern"));
static ROLE_MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"<@&[0-9]+>").expect("role pattern"));
static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").expect("url pattern"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("ws pattern"));
static EXCLAIM_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[！!]{2,}").expect("run pattern"));
static QUESTION_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[？?]{2,}").expect("run pattern"));
static PERIOD_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[。.]{2,}").expect("run pattern"));

/// Markdown decorations removed outright.
const MARKDOWN_TOKENS: &[&str] = &["**", "__", "~~", "||", "`", "*", "_", "\\"];

/// Clean chat text for synthesis. Returns an empty string when nothing
/// speakable remains.
pub fn normalize(text: &str) -> String {
    let mut out = URL.replace_all(text, "link").into_owned();
    out = CUSTOM_EMOJI.replace_all(&out, "emoji").into_owned();
    out = USER_MENTION.replace_all(&out, "someone").into_owned();
    out = CHANNEL_MENTION.replace_all(&out, "channel").into_owned();
    out = ROLE_MENTION.replace_all(&out, "role").into_owned();

    for token in MARKDOWN_TOKENS {
        out = out.replace(token, "");
    }
    out = out.replace('\r', "").replace('\n', "。").replace('\t', " ");

    out = EXCLAIM_RUN.replace_all(&out, "！").into_owned();
    out = QUESTION_RUN.replace_all(&out, "？").into_owned();
    out = PERIOD_RUN.replace_all(&out, "。").into_owned();
    out = WHITESPACE.replace_all(&out, " ").into_owned();

    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_discord_tokens() {
        let text = "<@123456> check <#789> and <:kappa:111> <a:wave:222>";
        assert_eq!(normalize(text), "someone check channel and emoji emoji");
    }

    #[test]
    fn replaces_urls() {
        assert_eq!(normalize("see https://example.com/page?x=1 now"), "see link now");
    }

    #[test]
    fn strips_markdown() {
        assert_eq!(normalize("**太字**と`コード`と||ネタバレ||"), "太字とコードとネタバレ");
    }

    #[test]
    fn newlines_become_sentence_breaks() {
        assert_eq!(normalize("一行目\n二行目"), "一行目。二行目");
    }

    #[test]
    fn collapses_punctuation_runs() {
        assert_eq!(normalize("すごい！！！ほんと？？"), "すごい！ほんと？");
        assert_eq!(normalize("待って。。。"), "待って。");
    }

    #[test]
    fn empty_after_cleanup() {
        assert_eq!(normalize("** ** `` "), "");
    }
}
