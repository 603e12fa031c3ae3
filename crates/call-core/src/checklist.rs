use catalog::Objective;
use llm_services::{Speaker, Turn};
use std::collections::BTreeMap;

/// Satisfied-state of every objective for `transcript`. An objective is met when any of
/// its keywords occurs, ignoring case, in the trainee's speech; blank keywords never match.
pub fn recompute(transcript: &[Turn], objectives: &[Objective]) -> BTreeMap<String, bool> {
    let said = trainee_text(transcript);
    objectives
        .iter()
        .map(|o| (o.id.clone(), matches_any(&said, &o.matches)))
        .collect()
}

fn trainee_text(transcript: &[Turn]) -> String {
    transcript
        .iter()
        .filter(|t| t.speaker == Speaker::Trainee)
        .map(|t| t.text.to_lowercase())
        .collect::<Vec<_>>()
        .join(" \n ")
}

fn matches_any(haystack: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|k| {
        let k = k.trim().to_lowercase();
        !k.is_empty() && haystack.contains(&k)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn objective(id: &str, matches: &[&str]) -> Objective {
        Objective {
            id: id.to_string(),
            text: id.to_string(),
            matches: matches.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn matches_trainee_speech_case_insensitively() {
        let objectives = vec![
            objective("greet", &["Здравствуйте", "добрый день"]),
            objective("price", &["стоимость"]),
        ];
        let transcript = vec![
            Turn::trainee("ЗДРАВСТВУЙТЕ, как у вас с пломбами?"),
            Turn::counterpart("Какая стоимость?"),
        ];
        let map = recompute(&transcript, &objectives);
        assert_eq!(map["greet"], true);
        assert_eq!(map["price"], false, "counterpart speech does not count");
    }

    #[test]
    fn recompute_is_idempotent_and_flips_exactly() {
        let objectives = vec![objective("visit", &["запис"]), objective("name", &["как вас зовут"])];
        let mut transcript = vec![Turn::trainee("Добрый день")];
        let before = recompute(&transcript, &objectives);
        assert_eq!(before, recompute(&transcript, &objectives));
        assert!(before.values().all(|v| !v));

        transcript.push(Turn::trainee("Давайте я вас запишу на вторник"));
        let after = recompute(&transcript, &objectives);
        assert_eq!(after["visit"], true);
        assert_eq!(after["name"], false);
    }

    #[test]
    fn blank_keywords_never_match() {
        let objectives = vec![objective("empty", &["", "  "]), objective("none", &[])];
        let map = recompute(&[Turn::trainee("что угодно")], &objectives);
        assert_eq!(map["empty"], false);
        assert_eq!(map["none"], false);
    }

    #[test]
    fn keywords_do_not_match_across_turns() {
        let objectives = vec![objective("split", &["день добрый"])];
        let map = recompute(
            &[Turn::trainee("Добрый день"), Turn::trainee("добрый вечер")],
            &objectives,
        );
        assert_eq!(map["split"], false);
    }
}
