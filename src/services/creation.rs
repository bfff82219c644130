//! Guided content creation — builds the cover-image prompt, the long-form
//! text prompt and the visible turn title for a course or e-book.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationKind {
    Course,
    Ebook,
}

impl CreationKind {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Course => "Curso",
            Self::Ebook => "E-book",
        }
    }

    fn default_style(self) -> &'static str {
        match self {
            Self::Course => "Profissional e didático",
            Self::Ebook => "Informativo e envolvente",
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CreationError {
    #[error("o tema é obrigatório")]
    MissingTopic,
    #[error("o público-alvo é obrigatório")]
    MissingAudience,
}

/// User answers collected by the creation form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreationForm {
    pub topic: String,
    pub audience: String,
    /// Optional tone; a per-kind default applies when blank.
    pub style: String,
}

/// Precomputed prompt pair for the two-stage guided flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuidedRequest {
    pub title: String,
    pub image_prompt: String,
    pub text_prompt: String,
}

impl CreationForm {
    /// Validate the form and render the prompts for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`CreationError`] when the topic or audience is blank.
    pub fn build(&self, kind: CreationKind) -> Result<GuidedRequest, CreationError> {
        let topic = self.topic.trim();
        let audience = self.audience.trim();
        if topic.is_empty() {
            return Err(CreationError::MissingTopic);
        }
        if audience.is_empty() {
            return Err(CreationError::MissingAudience);
        }
        let style = match self.style.trim() {
            "" => kind.default_style(),
            s => s,
        };

        Ok(GuidedRequest {
            title: format!("Criar {}: {topic}", kind.label()),
            image_prompt: cover_prompt(kind, topic, audience, style),
            text_prompt: match kind {
                CreationKind::Course => course_prompt(topic, audience, style),
                CreationKind::Ebook => ebook_prompt(topic, audience, style),
            },
        })
    }
}

fn cover_prompt(kind: CreationKind, topic: &str, audience: &str, style: &str) -> String {
    let subject = match kind {
        CreationKind::Course => "um curso online",
        CreationKind::Ebook => "um e-book",
    };
    format!(
        "Crie uma imagem de capa profissional e atraente para {subject} sobre \"{topic}\", \
pensada para o público \"{audience}\". Estilo visual: \"{style}\". \
Composição limpa, cores harmoniosas e sem nenhum texto escrito na imagem."
    )
}

fn course_prompt(topic: &str, audience: &str, style: &str) -> String {
    format!(
        "Atue como um especialista em design instrucional e educação.
Crie uma ESTRUTURA COMPLETA DE CURSO sobre o tema: \"{topic}\".
Público-alvo: \"{audience}\".
Tom/Estilo: \"{style}\".

A resposta deve ser formatada em Markdown e incluir:
1. Título do Curso (Cativante).
2. Descrição e Objetivos de Aprendizado.
3. Estrutura de Módulos (Mínimo 5 módulos).
4. Para cada módulo, liste as aulas e um breve resumo do conteúdo de cada aula.
5. Sugestão de exercícios práticos ou projetos."
    )
}

fn ebook_prompt(topic: &str, audience: &str, style: &str) -> String {
    format!(
        "Atue como um autor best-seller e editor profissional.
Crie o PLANEJAMENTO E O PRIMEIRO CAPÍTULO de um E-book sobre: \"{topic}\".
Público-alvo: \"{audience}\".
Gênero/Estilo: \"{style}\".

A resposta deve ser formatada em Markdown e incluir:
1. Título e Subtítulo Sugeridos.
2. Sumário Detalhado (Lista de capítulos com breves descrições).
3. Uma Introdução completa e engajadora.
4. O CAPÍTULO 1 COMPLETO escrito no estilo solicitado."
    )
}

#[cfg(test)]
#[path = "creation_test.rs"]
mod tests;
