use crate::core::state::{
    ArticleOutline, ConversationTurn, PersonaMatch, ReaderPersonaProfile, SteeringContext,
    WriterTypeProfile,
};

/// Blank left in the draft for the contributor to fill in by hand.
pub const PLACEHOLDER: &str = "【ここに記入】";

/// Headings of the five-section draft skeleton, in order.
pub const SECTION_MARKERS: [&str; 5] = [
    "## 1. はじめに",
    "## 2. 私の体験",
    "## 3. 感謝とお願い",
    "## 4. 実践アドバイス",
    "## 5. 最後に",
];

pub const FALLBACK_TITLE: &str = "あなたの体験が誰かの支えになる";
pub const FALLBACK_EXCERPT: &str = "インタビューで語られた体験をもとにした記事の下書きです。";
pub const DRAFT_FAILURE_PREFIX: &str = "記事の生成に失敗しました";

const GENERIC_OPENING_QUESTION: &str =
    "今日はあなたの体験を聞かせてください。まず、いちばん伝えたい出来事を一つ教えてもらえますか？";

pub fn strip_code_blocks(s: &str) -> String {
    let s = s.trim();
    if s.starts_with("```json") {
        s.trim_start_matches("```json").trim_end_matches("```").trim().to_string()
    } else if s.starts_with("```") {
        s.trim_start_matches("```").trim_end_matches("```").trim().to_string()
    } else {
        s.to_string()
    }
}

/// Speaker-labelled lines, oldest first.
pub fn flatten_transcript(turns: &[ConversationTurn]) -> String {
    turns
        .iter()
        .map(|t| format!("{}: {}", t.speaker.label(), t.text.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn opening_message(
    writer: &WriterTypeProfile,
    reader: &ReaderPersonaProfile,
    persona_match: &PersonaMatch,
) -> String {
    let question = persona_match
        .focus_questions
        .first()
        .map(String::as_str)
        .unwrap_or(GENERIC_OPENING_QUESTION);
    format!(
        "「{}」（{}）のあなたの体験を、「{}」（{}）に向けた記事にしていきます。\n\
         {}\n\n\
         最初の質問です。{}",
        writer.name,
        writer.description,
        reader.name,
        reader.description,
        persona_match.match_rationale,
        question
    )
}

pub fn generic_opening() -> String {
    GENERIC_OPENING_QUESTION.to_string()
}

fn numbered(items: &[String]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, q)| format!("{}. {}", i + 1, q))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn interview_prompt(turns: &[ConversationTurn], steering: &SteeringContext) -> String {
    let steering_block = match steering {
        SteeringContext::WithMatch(m) => format!(
            "\n書き手タイプ: {}\n想定読者: {}\n焦点となる質問:\n{}\n重点領域: {}\n",
            m.writer_type_id,
            m.reader_persona_id,
            numbered(&m.focus_questions),
            m.focus_areas.join("、")
        ),
        SteeringContext::NoMatch => {
            "\n想定読者は指定されていません。体験の具体的な場面と、そこから得た気づきを引き出してください。\n"
                .to_string()
        }
    };

    format!(
        "あなたは体験記事のためのインタビュアーです。投稿者の体験を、想定読者の役に立つ記事にするための材料を集めます。\
        {}\
        \n指示:\
        \n- 一度に質問は一つだけにしてください。\
        \n- 直前の回答に共感を一言添えてから、焦点となる質問のうちまだ十分に聞けていないものへ自然につなげてください。\
        \n- 投稿者が話していない事実を決めつけないでください。\
        \n- インタビュアーとしての発言のみを返してください。\
        \n\n会話履歴:\n{}",
        steering_block,
        flatten_transcript(turns)
    )
}

pub fn extraction_prompt(transcript: &str) -> String {
    format!(
        "以下のインタビュー記録から、記事の材料となる要点を抽出してください。\
        \n\n指示:\
        \n- 記録に書かれている内容だけを抽出し、解釈や推測で新しい事実を加えないでください。\
        \n- summary は200文字以内にしてください。\
        \n- symbolicQuotes は投稿者の発言をそのまま引用してください。\
        \n\n次のスキーマの JSON オブジェクトのみを返してください:\
        \n{{ \"summary\": \"...\", \"emotionalPeaks\": [ {{ \"emotion\": \"...\", \"episode\": \"...\" }} ], \
        \"keyTakeaways\": [\"...\"], \"symbolicQuotes\": [\"...\"], \"targetReaders\": [\"...\"] }}\
        \n\nインタビュー記録:\n{}",
        transcript
    )
}

pub fn outline_prompt(key_points_json: &str) -> String {
    format!(
        "以下の要点から、体験記事の構成案を作成してください。\
        \n\n指示:\
        \n- title は25〜35文字で、読者が思わず読みたくなる意外性や問いを含めてください。\
        \n- leadText は200〜300文字で、平叙文ではなく問いかけか情景描写から始めてください。\
        \n- excerpt は記事一覧に表示する一文の紹介文にしてください。\
        \n\n次のスキーマの JSON オブジェクトのみを返してください:\
        \n{{ \"title\": \"...\", \"excerpt\": \"...\", \"leadText\": \"...\", \
        \"sections\": [ {{ \"heading\": \"...\", \"purpose\": \"...\", \"keyElements\": [\"...\"] }} ], \
        \"callToAction\": \"...\" }}\
        \n\n要点:\n{}",
        key_points_json
    )
}

fn skeleton() -> String {
    format!(
        "{s1}\n（読者への共感から始める書き出し。例: {p}）\n\n\
         {s2}\n（具体的なエピソードを時系列で。いつ: {p} / 何が起きた: {p} / そのとき感じたこと: {p}）\n\n\
         {s3}\n（支えてくれた人への感謝と、周囲へのお願い。感謝: {p} / お願い: {p}）\n\n\
         {s4}\n- {p}\n- {p}\n- {p}\n\n\
         {s5}\n（読者へのメッセージ。{p}）",
        s1 = SECTION_MARKERS[0],
        s2 = SECTION_MARKERS[1],
        s3 = SECTION_MARKERS[2],
        s4 = SECTION_MARKERS[3],
        s5 = SECTION_MARKERS[4],
        p = PLACEHOLDER,
    )
}

pub fn draft_prompt(transcript: &str, outline: &ArticleOutline, steering: &SteeringContext) -> String {
    let variant = match steering {
        SteeringContext::WithMatch(m) => format!(
            "\nこの記事は書き手タイプ「{}」から想定読者「{}」へ向けたものです。\
            \n組み合わせの意図: {}\
            \nインタビューの焦点:\n{}\
            \n- すべてのセクションをこの組み合わせに合わせて書き分けてください。\
            \n- 空欄 {} も、この読者に向けて投稿者が何を書くべきかが分かる位置に置いてください。",
            m.writer_type_id,
            m.reader_persona_id,
            m.match_rationale,
            numbered(&m.focus_questions),
            PLACEHOLDER
        ),
        SteeringContext::NoMatch => "\n想定読者は特定せず、同じような状況にいる人全般に向けて書いてください。".to_string(),
    };

    let outline_hint = if outline.title.is_empty() && outline.lead_text.is_empty() {
        String::new()
    } else {
        format!(
            "\n構成案のタイトル: {}\n構成案のリード文: {}\n",
            outline.title, outline.lead_text
        )
    };

    format!(
        "インタビュー記録をもとに、投稿者が後から手で仕上げる記事の下書きを作成してください。\
        {}{}\
        \n\n指示:\
        \n- 下のテンプレートの5つの見出しをそのままの表記・順番で使ってください。\
        \n- 記録から分かることは具体的に書き、分からないことは空欄 {} のまま残してください。\
        \n- 空欄 {} を埋めたり削除したりしないでください。例示の文は具体的でも構いません。\
        \n- 記事本文のみを返してください。\
        \n\nテンプレート:\n{}\
        \n\nインタビュー記録:\n{}",
        variant,
        outline_hint,
        PLACEHOLDER,
        PLACEHOLDER,
        skeleton(),
        transcript
    )
}
