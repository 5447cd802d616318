//! Static writer-type / reader-persona registry and the matches between them.
//!
//! The catalog is validated once when it is built; a writer type without a
//! match is a data error reported by [`PersonaCatalog::new`], never at lookup
//! time. After construction the catalog is read-only and can be shared
//! across sessions behind an `Arc`.

use std::collections::HashSet;

use crate::core::error::{CatalogError, InterviewError};
use crate::core::state::{PersonaMatch, ReaderPersonaProfile, WriterTypeProfile};

pub trait Profile {
    const KIND: &'static str;
    fn id(&self) -> &str;
}

impl Profile for WriterTypeProfile {
    const KIND: &'static str = "writer type";
    fn id(&self) -> &str {
        &self.id
    }
}

impl Profile for ReaderPersonaProfile {
    const KIND: &'static str = "reader persona";
    fn id(&self) -> &str {
        &self.id
    }
}

pub fn resolve_profile<'a, P: Profile>(profiles: &'a [P], id: &str) -> Result<&'a P, InterviewError> {
    profiles
        .iter()
        .find(|p| p.id() == id)
        .ok_or_else(|| InterviewError::not_found(P::KIND, id))
}

#[derive(Debug, Clone)]
pub struct PersonaCatalog {
    writer_types: Vec<WriterTypeProfile>,
    reader_personas: Vec<ReaderPersonaProfile>,
    matches: Vec<PersonaMatch>,
}

impl PersonaCatalog {
    pub fn new(
        writer_types: Vec<WriterTypeProfile>,
        reader_personas: Vec<ReaderPersonaProfile>,
        matches: Vec<PersonaMatch>,
    ) -> Result<Self, CatalogError> {
        unique_ids(&writer_types)?;
        unique_ids(&reader_personas)?;

        let mut pairs = HashSet::new();
        for m in &matches {
            if resolve_profile(&writer_types, &m.writer_type_id).is_err() {
                return Err(CatalogError::UnknownProfile {
                    kind: WriterTypeProfile::KIND,
                    id: m.writer_type_id.clone(),
                });
            }
            if resolve_profile(&reader_personas, &m.reader_persona_id).is_err() {
                return Err(CatalogError::UnknownProfile {
                    kind: ReaderPersonaProfile::KIND,
                    id: m.reader_persona_id.clone(),
                });
            }
            if m.focus_questions.is_empty() {
                return Err(CatalogError::NoFocusQuestions {
                    writer_type_id: m.writer_type_id.clone(),
                    reader_persona_id: m.reader_persona_id.clone(),
                });
            }
            if !pairs.insert((m.writer_type_id.as_str(), m.reader_persona_id.as_str())) {
                return Err(CatalogError::DuplicatePair {
                    writer_type_id: m.writer_type_id.clone(),
                    reader_persona_id: m.reader_persona_id.clone(),
                });
            }
        }

        for w in &writer_types {
            if !matches.iter().any(|m| m.writer_type_id == w.id) {
                return Err(CatalogError::MissingMatch(w.id.clone()));
            }
        }

        Ok(Self {
            writer_types,
            reader_personas,
            matches,
        })
    }

    /// The catalog shipped with the application.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::new(builtin_writer_types(), builtin_reader_personas(), builtin_matches())
    }

    pub fn list_writer_types(&self) -> &[WriterTypeProfile] {
        &self.writer_types
    }

    pub fn list_reader_personas(&self) -> &[ReaderPersonaProfile] {
        &self.reader_personas
    }

    pub fn all_matches(&self) -> &[PersonaMatch] {
        &self.matches
    }

    pub fn writer_type(&self, id: &str) -> Result<&WriterTypeProfile, InterviewError> {
        resolve_profile(&self.writer_types, id)
    }

    pub fn reader_persona(&self, id: &str) -> Result<&ReaderPersonaProfile, InterviewError> {
        resolve_profile(&self.reader_personas, id)
    }

    /// All matches for a writer type, in catalog order. Never empty for a
    /// known id.
    pub fn recommended_matches(&self, writer_type_id: &str) -> Result<Vec<&PersonaMatch>, InterviewError> {
        self.writer_type(writer_type_id)?;
        Ok(self
            .matches
            .iter()
            .filter(|m| m.writer_type_id == writer_type_id)
            .collect())
    }

    pub fn find_match(
        &self,
        writer_type_id: &str,
        reader_persona_id: &str,
    ) -> Result<&PersonaMatch, InterviewError> {
        self.recommended_matches(writer_type_id)?
            .into_iter()
            .find(|m| m.reader_persona_id == reader_persona_id)
            .ok_or_else(|| {
                InterviewError::not_found(
                    "persona match",
                    &format!("{}/{}", writer_type_id, reader_persona_id),
                )
            })
    }
}

fn unique_ids<P: Profile>(profiles: &[P]) -> Result<(), CatalogError> {
    let mut seen = HashSet::new();
    for p in profiles {
        if !seen.insert(p.id()) {
            return Err(CatalogError::DuplicateProfile {
                kind: P::KIND,
                id: p.id().to_string(),
            });
        }
    }
    Ok(())
}

// --- Built-in data ---

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn writer(
    id: &str,
    name: &str,
    description: &str,
    characteristics: &[&str],
    strengths: &[&str],
    challenges: &[&str],
) -> WriterTypeProfile {
    WriterTypeProfile {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        characteristics: strings(characteristics),
        strengths: strings(strengths),
        challenges: strings(challenges),
    }
}

fn reader(
    id: &str,
    name: &str,
    description: &str,
    target_life_stage: &str,
    situation_tags: &[&str],
    unspoken_concerns: &[&str],
    desired_information: &[&str],
) -> ReaderPersonaProfile {
    ReaderPersonaProfile {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        target_life_stage: target_life_stage.to_string(),
        situation_tags: strings(situation_tags),
        unspoken_concerns: strings(unspoken_concerns),
        desired_information: strings(desired_information),
    }
}

fn pairing(
    writer_type_id: &str,
    reader_persona_id: &str,
    match_rationale: &str,
    focus_questions: &[&str],
    focus_areas: &[&str],
) -> PersonaMatch {
    PersonaMatch {
        writer_type_id: writer_type_id.to_string(),
        reader_persona_id: reader_persona_id.to_string(),
        match_rationale: match_rationale.to_string(),
        focus_questions: strings(focus_questions),
        focus_areas: strings(focus_areas),
    }
}

fn builtin_writer_types() -> Vec<WriterTypeProfile> {
    vec![
        writer(
            "comeback",
            "復帰組",
            "育児・介護・療養などで一度キャリアを離れ、再び働き始めた人",
            &["ブランクを経験している", "復帰までの葛藤を言葉にできる", "周囲の支えを受けた実感がある"],
            &["再スタートの具体的な手順を語れる", "不安との付き合い方を知っている"],
            &["ブランク中の自分を過小評価しがち", "苦労話が愚痴に寄りやすい"],
        ),
        writer(
            "dual_career",
            "両立組",
            "キャリアを途切れさせずに仕事と育児を同時に続けている人",
            &["時間のやりくりに工夫がある", "職場との交渉経験がある"],
            &["日々の段取りを具体的に示せる", "制度の使いこなし方を知っている"],
            &["忙しさゆえに感情面の振り返りが浅くなりがち"],
        ),
        writer(
            "career_shift",
            "転身組",
            "子育てや家族の変化をきっかけに、職種や働き方を大きく変えた人",
            &["価値観の転換点を持つ", "複数の働き方を比較できる"],
            &["決断のプロセスを順序立てて語れる", "失ったものと得たものを対比できる"],
            &["決断を美化しすぎることがある"],
        ),
        writer(
            "solo_parent",
            "ひとり親",
            "ひとりで子育てと生計の両方を担ってきた人",
            &["頼れる先を自分で探してきた", "限られた時間で優先順位をつけてきた"],
            &["公的支援や地域資源の実体験がある", "折れない工夫を語れる"],
            &["弱音を見せることに抵抗がある"],
        ),
    ]
}

fn builtin_reader_personas() -> Vec<ReaderPersonaProfile> {
    vec![
        reader(
            "struggling_parent",
            "両立に悩む親",
            "仕事と育児の両立に行き詰まり、このままでいいのか迷っている親",
            "未就学児〜小学生の子育て期",
            &["時短勤務", "保育園", "キャリアの停滞感"],
            &["自分だけが回せていないのではないか", "職場に迷惑をかけているという罪悪感"],
            &["同じ状況を乗り越えた人の具体的な工夫", "気持ちの持ち直し方"],
        ),
        reader(
            "blank_anxious",
            "ブランクに不安を抱える人",
            "離職期間が長くなり、復職に踏み出せずにいる人",
            "育児・介護が一段落した時期",
            &["再就職", "スキルの陳腐化", "面接"],
            &["もう戦力として見てもらえないのでは", "家族に負担をかけるのでは"],
            &["復帰までの具体的なステップ", "ブランクの伝え方"],
        ),
        reader(
            "first_time_parent",
            "初めての育児を控えた人",
            "出産・育休を控え、働き方がどう変わるのか想像できずにいる人",
            "妊娠中〜育休中",
            &["育休", "復職準備", "パートナーとの分担"],
            &["今のキャリアを手放すことになるのでは"],
            &["復職前にしておくべき準備", "職場との話し合い方"],
        ),
        reader(
            "career_rethinker",
            "働き方を見直したい人",
            "家族の事情や価値観の変化から、今の働き方を変えるべきか考えている人",
            "子育て期〜中堅期",
            &["転職", "在宅勤務", "収入の変化"],
            &["変えたら後悔するのでは", "収入が下がったら家族を支えられない"],
            &["決断の判断材料", "変えた後のリアルな生活"],
        ),
        reader(
            "manager_supporter",
            "子育て中の部下を支える管理職",
            "育児中や復職直後のメンバーをどう支えればよいか模索している管理職",
            "管理職",
            &["マネジメント", "チーム運営", "復職支援"],
            &["配慮が押し付けになっていないか"],
            &["当事者が本当に助かった関わり方", "避けてほしかった言動"],
        ),
    ]
}

fn builtin_matches() -> Vec<PersonaMatch> {
    vec![
        pairing(
            "comeback",
            "struggling_parent",
            "一度立ち止まってから戻った経験は、今まさに行き詰まっている親に「止まっても終わりではない」と伝えられる",
            &[
                "キャリアを離れると決めたとき、いちばん迷ったことは何でしたか？",
                "復帰を決めた直接のきっかけを教えてください。",
                "両立に悩んでいた頃の自分に、今ならどんな言葉をかけますか？",
            ],
            &["離職・休職の決断", "復帰のきっかけ", "罪悪感との向き合い方"],
        ),
        pairing(
            "comeback",
            "blank_anxious",
            "ブランクからの再スタートを実際に切った人の手順は、踏み出せずにいる人にとって最も具体的な道しるべになる",
            &[
                "ブランク中、復職について最も不安だったことは何ですか？",
                "応募や面接でブランクをどう説明しましたか？",
                "復帰して最初の一か月で印象に残っている出来事はありますか？",
            ],
            &["ブランク期間の過ごし方", "再就職活動の具体策", "復帰直後の適応"],
        ),
        pairing(
            "comeback",
            "manager_supporter",
            "復帰当事者の目線で、職場の関わり方の何が助けになり何が負担だったかを管理職に届けられる",
            &[
                "復帰直後、上司や同僚のどんな関わりに救われましたか？",
                "逆に、善意でも負担に感じた言動はありましたか？",
                "管理職の方に一つだけお願いできるとしたら何ですか？",
            ],
            &["職場の支援", "配慮と負担の境界", "管理職への提言"],
        ),
        pairing(
            "dual_career",
            "struggling_parent",
            "両立を続けている人の日々の工夫は、同じ渦中にいる親がすぐに試せるヒントになる",
            &[
                "一日の中でいちばん綱渡りだと感じる時間帯はいつですか？",
                "両立が崩れかけたとき、何を手放しましたか？",
                "続けてこられた一番の理由は何だと思いますか？",
            ],
            &["時間のやりくり", "手放す決断", "続ける原動力"],
        ),
        pairing(
            "dual_career",
            "first_time_parent",
            "育休前後の準備と職場との調整を経験した人の話は、これから当事者になる人の見通しをつくる",
            &[
                "育休に入る前に、やっておいてよかった準備は何ですか？",
                "復職のタイミングはどのように決めましたか？",
                "パートナーとの分担はどう話し合いましたか？",
            ],
            &["育休前の準備", "復職時期の判断", "家庭内の分担"],
        ),
        pairing(
            "career_shift",
            "career_rethinker",
            "実際に働き方を変えた人の判断材料と、その後の暮らしの実感は、迷っている人の決断を具体化する",
            &[
                "働き方を変えようと考え始めたきっかけは何でしたか？",
                "決断の前に、何を比べて何を諦めましたか？",
                "変えてみて、想像と違ったことはありましたか？",
            ],
            &["転機", "判断基準", "変化後の実感"],
        ),
        pairing(
            "career_shift",
            "struggling_parent",
            "両立に苦しんだ末に別の道を選んだ経験は、今の形にこだわらなくてよいという選択肢を示せる",
            &[
                "以前の働き方で、いちばん苦しかった場面を教えてください。",
                "別の道を選ぶと決めたとき、周囲の反応はどうでしたか？",
                "今振り返って、あの決断をどう感じていますか？",
            ],
            &["以前の働き方の限界", "周囲との対話", "決断の振り返り"],
        ),
        pairing(
            "solo_parent",
            "struggling_parent",
            "ひとりで回してきた人の優先順位のつけ方は、余裕を失いかけている親に現実的な支えを与える",
            &[
                "ひとりで抱えきれないと感じたとき、最初に頼った先はどこでしたか？",
                "毎日の中で、あえて手を抜くと決めていることは何ですか？",
                "同じように頑張っている親に伝えたいことは何ですか？",
            ],
            &["支援の探し方", "優先順位", "気持ちの支え"],
        ),
        pairing(
            "solo_parent",
            "career_rethinker",
            "生計を一人で担う立場から働き方を選び直した経験は、収入面の不安を抱える人に現実的な視点を与える",
            &[
                "収入と子どもとの時間、どのように折り合いをつけてきましたか？",
                "働き方を変えたとき、使った制度や支援はありますか？",
                "今の働き方を選んでよかったと感じる瞬間はどんなときですか？",
            ],
            &["収入と時間の両立", "制度・支援の活用", "選択への納得感"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_builds() {
        let catalog = PersonaCatalog::builtin().unwrap();
        assert!(!catalog.list_writer_types().is_empty());
        assert!(!catalog.list_reader_personas().is_empty());
    }

    #[test]
    fn test_every_writer_type_has_matches_for_itself() {
        let catalog = PersonaCatalog::builtin().unwrap();
        for w in catalog.list_writer_types() {
            let matches = catalog.recommended_matches(&w.id).unwrap();
            assert!(!matches.is_empty(), "{} has no match", w.id);
            assert!(matches.iter().all(|m| m.writer_type_id == w.id));
        }
    }

    #[test]
    fn test_match_pairs_are_unique() {
        let catalog = PersonaCatalog::builtin().unwrap();
        let mut seen = HashSet::new();
        for m in catalog.all_matches() {
            assert!(seen.insert((m.writer_type_id.clone(), m.reader_persona_id.clone())));
        }
    }

    #[test]
    fn test_comeback_recommends_struggling_parent() {
        let catalog = PersonaCatalog::builtin().unwrap();
        let matches = catalog.recommended_matches("comeback").unwrap();
        let m = matches
            .iter()
            .find(|m| m.reader_persona_id == "struggling_parent")
            .unwrap();
        assert!(!m.match_rationale.is_empty());
        assert!(!m.focus_questions.is_empty());
    }

    #[test]
    fn test_unknown_ids_are_not_found() {
        let catalog = PersonaCatalog::builtin().unwrap();
        assert!(matches!(
            catalog.recommended_matches("astronaut"),
            Err(InterviewError::NotFound { kind: "writer type", .. })
        ));
        assert!(matches!(
            resolve_profile(catalog.list_reader_personas(), "nobody"),
            Err(InterviewError::NotFound { kind: "reader persona", .. })
        ));
        assert!(matches!(
            catalog.find_match("comeback", "career_rethinker"),
            Err(InterviewError::NotFound { kind: "persona match", .. })
        ));
    }

    #[test]
    fn test_stable_listing_order() {
        let catalog = PersonaCatalog::builtin().unwrap();
        let ids: Vec<&str> = catalog.list_writer_types().iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, ["comeback", "dual_career", "career_shift", "solo_parent"]);
    }

    #[test]
    fn test_writer_without_match_is_rejected() {
        let mut writers = builtin_writer_types();
        writers.push(writer("lurker", "見守り組", "説明", &[], &[], &[]));
        let err = PersonaCatalog::new(writers, builtin_reader_personas(), builtin_matches()).unwrap_err();
        assert_eq!(err, CatalogError::MissingMatch("lurker".to_string()));
    }

    #[test]
    fn test_duplicate_pair_is_rejected() {
        let mut matches = builtin_matches();
        matches.push(matches[0].clone());
        let err = PersonaCatalog::new(builtin_writer_types(), builtin_reader_personas(), matches).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicatePair { .. }));
    }

    #[test]
    fn test_match_to_unknown_persona_is_rejected() {
        let mut matches = builtin_matches();
        matches.push(pairing("comeback", "ghost", "r", &["q"], &[]));
        let err = PersonaCatalog::new(builtin_writer_types(), builtin_reader_personas(), matches).unwrap_err();
        assert_eq!(
            err,
            CatalogError::UnknownProfile {
                kind: "reader persona",
                id: "ghost".to_string()
            }
        );
    }

    #[test]
    fn test_match_without_questions_is_rejected() {
        let mut matches = builtin_matches();
        matches[0].focus_questions.clear();
        let err = PersonaCatalog::new(builtin_writer_types(), builtin_reader_personas(), matches).unwrap_err();
        assert!(matches!(err, CatalogError::NoFocusQuestions { .. }));
    }
}
