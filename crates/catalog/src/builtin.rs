//! Built-in dental clinic catalog used when no catalog directory is configured.

use crate::loader::Catalog;
use crate::types::{Objective, Persona, Scenario};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn task(id: &str, text: &str, matches: &[&str]) -> Objective {
    Objective {
        id: id.to_string(),
        text: text.to_string(),
        matches: strings(matches),
    }
}

fn personas() -> Vec<Persona> {
    vec![
        Persona {
            id: "patient-1".to_string(),
            title: "Пациент с вопросом о цене имплантации".to_string(),
            disc: "C".to_string(),
            inner_need: "Боится переплатить и получить некачественное лечение".to_string(),
            outer_need: "Здравствуйте, сколько у вас стоит имплант?".to_string(),
            objections: strings(&["Это слишком дорого", "В другой клинике дешевле"]),
            style_rules: strings(&[
                "Задаёт уточняющие вопросы о гарантиях и материалах",
                "Любит цифры и конкретику",
            ]),
        },
        Persona {
            id: "patient-2".to_string(),
            title: "Тревожный пациент с зубной болью".to_string(),
            disc: "S".to_string(),
            inner_need: "Хочет, чтобы лечение было без боли и его успокоили".to_string(),
            outer_need: "У меня болит зуб, но я очень боюсь лечиться".to_string(),
            objections: strings(&["Я боюсь боли", "Может само пройдёт"]),
            style_rules: strings(&["Говорит мягко, часто сомневается"]),
        },
        Persona {
            id: "patient-3".to_string(),
            title: "Занятой руководитель".to_string(),
            disc: "D".to_string(),
            inner_need: "Решить проблему быстро и за минимальное число визитов".to_string(),
            outer_need: "Мне нужно поставить пломбу, у меня мало времени".to_string(),
            objections: strings(&["У меня нет времени"]),
            style_rules: strings(&["Отвечает коротко", "Не любит долгих объяснений"]),
        },
    ]
}

fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            id: "price".to_string(),
            title: "Отработка возражения «Это слишком дорого»".to_string(),
            tips: Some(
                "Не называй цену сразу: сначала выясни потребность, затем свяжи стоимость с ценностью и предложи осмотр."
                    .to_string(),
            ),
            tasks: vec![
                task("greet", "Поздороваться и представиться", &["здравствуйте", "добрый день", "меня зовут"]),
                task("needs", "Выяснить потребность", &["расскажите", "что беспокоит", "как давно", "почему"]),
                task("value", "Обосновать ценность", &["гарантия", "материал", "качество", "опыт врача"]),
                task("next_step", "Предложить следующий шаг", &["осмотр", "консультац", "снимок", "план лечения"]),
                task("book", "Записать на приём", &["запис", "удобно", "время"]),
            ],
        },
        Scenario {
            id: "bad-review".to_string(),
            title: "Работа с негативным отзывом".to_string(),
            tips: Some("Признай проблему, извинись и предложи конкретное решение.".to_string()),
            tasks: vec![
                task("greet", "Поздороваться", &["здравствуйте", "добрый день"]),
                task("empathy", "Проявить эмпатию", &["понимаю", "сожалею", "извините", "простите"]),
                task("clarify", "Уточнить детали ситуации", &["расскажите", "что произошло", "уточните"]),
                task("resolve", "Предложить решение", &["предлагаю", "бесплатно", "повторный", "исправим"]),
            ],
        },
        Scenario {
            id: "first".to_string(),
            title: "Сценарий «Первичная консультация»".to_string(),
            tips: None,
            tasks: vec![
                task("greet", "Установить контакт", &["здравствуйте", "добрый день", "меня зовут"]),
                task("needs", "Выявить потребности", &["что беспокоит", "расскажите", "пломб", "болит"]),
                task("book", "Пригласить на осмотр", &["осмотр", "запис"]),
            ],
        },
    ]
}

pub fn builtin_catalog() -> Catalog {
    let mut catalog = Catalog::default();
    for p in personas() {
        catalog.insert_persona(p);
    }
    for s in scenarios() {
        catalog.insert_scenario(s);
    }
    catalog
}
