//! Prompt construction for the persona dialogue and the rubric evaluation.

use crate::{EvaluationFailure, EvaluationOutcome, EvaluationReport, EvaluationRequest, Turn};
use catalog::Persona;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

impl From<&Turn> for ChatMessage {
    fn from(turn: &Turn) -> Self {
        ChatMessage::new(turn.speaker.chat_role(), turn.text.clone())
    }
}

const DEFAULT_OPENING: &str = "Здравствуйте. Хотел(а) бы записаться, есть вопрос по зубам.";

/// System prompt that makes the model play `persona` as a cooperative ("easy") patient.
pub fn persona_system_prompt(persona: &Persona) -> String {
    let mut lines = vec![
        "Ты — пациент стоматологической клиники, а не ИИ. Ты говоришь с администратором клиники по телефону.".to_string(),
        "Ты лёгкий собеседник: помогаешь администратору провести консультацию и записать тебя на следующий шаг.".to_string(),
        String::new(),
        "Поведение:".to_string(),
        "- Отвечай доброжелательно и по делу, без долгих монологов.".to_string(),
        "- На прямые вопросы отвечай конкретно, не сопротивляйся ради сопротивления.".to_string(),
        "- Внутреннюю потребность раскрывай после 1–2 уточняющих вопросов или после проявленной эмпатии.".to_string(),
        "- Возражения мягкие, за весь разговор не больше одного главного.".to_string(),
        "- Если администратор проявил эмпатию, задал 2–3 вопроса, предложил понятный следующий шаг и пригласил записаться — соглашайся и выбирай удобное время.".to_string(),
        String::new(),
        format!("Профиль: {}", persona.title),
        format!("DISC: {}", persona.disc),
        format!("Внутренняя потребность: {}", persona.inner_need),
        format!("Внешняя потребность (с неё начинаешь): {}", persona.outer_need),
        format!("Возможные возражения (выбери одно): {}", persona.objections.join("; ")),
    ];
    if !persona.style_rules.is_empty() {
        lines.push(String::new());
        lines.push("Особенности речи:".to_string());
        lines.extend(persona.style_rules.iter().map(|r| format!("- {r}")));
    }
    lines.extend([
        String::new(),
        "Формат ответа: 1–3 предложения живой разговорной речи, без списков и пояснений в скобках. Никогда не упоминай, что ты модель или система.".to_string(),
    ]);
    lines.join("\n")
}

/// Full message list for a dialogue call. When the trainee has not said anything yet,
/// the persona's opening line is seeded so the model continues from it.
pub fn dialogue_messages(persona: &Persona, history: &[Turn]) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::new("system", persona_system_prompt(persona))];
    let trainee_spoke = history
        .iter()
        .any(|t| t.speaker == crate::Speaker::Trainee && !t.text.trim().is_empty());
    if !trainee_spoke {
        let opening = if persona.outer_need.trim().is_empty() {
            DEFAULT_OPENING
        } else {
            persona.outer_need.as_str()
        };
        messages.push(ChatMessage::new("assistant", opening));
    }
    messages.extend(history.iter().map(ChatMessage::from));
    messages
}

/// One block of the sales rubric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RubricItem {
    pub key: &'static str,
    pub title: &'static str,
    pub focus: &'static str,
}

pub const RUBRIC: [RubricItem; 5] = [
    RubricItem {
        key: "contact",
        title: "Установление контакта",
        focus: "тон, эмпатия, рамка разговора",
    },
    RubricItem {
        key: "needs",
        title: "Выявление потребностей",
        focus: "вопросы, уточнения, фиксация боли",
    },
    RubricItem {
        key: "value",
        title: "Презентация ценности",
        focus: "связка свойство → выгода → потребность",
    },
    RubricItem {
        key: "objections",
        title: "Работа с возражениями",
        focus: "логика, доказательства, снятие риска",
    },
    RubricItem {
        key: "closing",
        title: "Закрытие на следующий шаг",
        focus: "конкретное предложение, договорённость",
    },
];

pub fn evaluation_system_prompt(context: &str) -> String {
    let mut lines = vec![
        "Ты — строгий аудитор качества продаж. Оцени диалог продавца с клиентом по рубрике.".to_string(),
        "Верни только JSON строго по схеме, без текста вокруг.".to_string(),
        String::new(),
        r#"Схема: { "total": number (0-10), "blocks": [{ "key": string, "title": string, "score": number (0-5), "what_went_well": string[], "to_improve": string[], "examples": string[] }], "summary": string }"#.to_string(),
        String::new(),
        format!("Продукт, который продавали: {context}"),
        "Блоки рубрики:".to_string(),
    ];
    lines.extend(
        RUBRIC
            .iter()
            .map(|b| format!("- {}: {} ({})", b.key, b.title, b.focus)),
    );
    lines.join("\n")
}

pub fn evaluation_messages(request: &EvaluationRequest) -> Vec<ChatMessage> {
    let transcript: Vec<ChatMessage> = request.transcript.iter().map(ChatMessage::from).collect();
    let transcript_json = serde_json::to_string(&transcript).unwrap_or_else(|_| "[]".to_string());
    vec![
        ChatMessage::new("system", evaluation_system_prompt(&request.context)),
        ChatMessage::new("user", format!("Транскрипт:\n{transcript_json}")),
    ]
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Interpret model output as a rubric report.
pub fn parse_report(raw: &str) -> EvaluationOutcome {
    let body = strip_code_fence(raw);
    let value: serde_json::Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return Err(EvaluationFailure::non_json(raw)),
    };
    serde_json::from_value::<EvaluationReport>(value)
        .map_err(|e| EvaluationFailure::malformed(e.to_string(), raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persona() -> Persona {
        catalog::builtin_catalog()
            .persona("patient-1")
            .cloned()
            .unwrap()
    }

    #[test]
    fn seeds_opening_line_until_trainee_speaks() {
        let p = persona();
        let fresh = dialogue_messages(&p, &[]);
        assert_eq!(fresh.len(), 2);
        assert_eq!(fresh[1].role, "assistant");
        assert_eq!(fresh[1].content, p.outer_need);

        let blank = dialogue_messages(&p, &[Turn::trainee("   ")]);
        assert_eq!(blank[1].content, p.outer_need);

        let history = vec![Turn::trainee("Добрый день"), Turn::counterpart("Здравствуйте")];
        let msgs = dialogue_messages(&p, &history);
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[1], ChatMessage::new("user", "Добрый день"));
        assert_eq!(msgs[2].role, "assistant");
    }

    #[test]
    fn persona_prompt_mentions_profile() {
        let p = persona();
        let prompt = persona_system_prompt(&p);
        assert!(prompt.contains(&p.inner_need));
        assert!(prompt.contains(&format!("DISC: {}", p.disc)));
        for rule in &p.style_rules {
            assert!(prompt.contains(rule.as_str()));
        }
    }

    #[test]
    fn evaluation_prompt_lists_rubric_and_product() {
        let req = EvaluationRequest {
            transcript: vec![Turn::trainee("Здравствуйте")],
            context: "имплантация".to_string(),
        };
        let msgs = evaluation_messages(&req);
        assert!(msgs[0].content.contains("имплантация"));
        for item in RUBRIC {
            assert!(msgs[0].content.contains(item.key));
        }
        assert!(msgs[1].content.starts_with("Транскрипт:\n"));
        assert!(msgs[1].content.contains("\"role\":\"user\""));
    }

    #[test]
    fn parse_report_classifies_failures() {
        assert!(parse_report("Оценка: 7 из 10").unwrap_err().is_non_json());

        let wrong_shape = parse_report(r#"{"score": 3}"#).unwrap_err();
        assert!(!wrong_shape.is_non_json());
        assert!(wrong_shape.details.is_some());

        let fenced = "```json\n{\"total\": 6, \"blocks\": [], \"summary\": \"неплохо\"}\n```";
        assert_eq!(parse_report(fenced).unwrap().total, 6.0);
    }
}
