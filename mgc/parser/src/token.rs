use core::fmt;

use mgc_common::Span;

#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub struct Token {
    pub kind: TokenKind,
    /// Global span, already rebased by the file offset
    pub span: Span,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}@{}", self.kind.describe(), self.span)
    }
}

#[derive(logos::Logos, Debug, Eq, PartialEq, Clone, Copy)]
pub enum TokenKind {
    #[token("(")]
    ParenOpen,

    #[token(")")]
    ParenClose,

    #[token("{")]
    BraceOpen,

    #[token("}")]
    BraceClose,

    #[token("[")]
    BracketOpen,

    #[token("]")]
    BracketClose,

    #[token(",")]
    Comma,

    #[token(";")]
    Semicolon,

    #[token(":")]
    Colon,

    #[token("::")]
    PathSep,

    #[token(".")]
    Dot,

    #[token("=")]
    Assign,

    #[token("+=")]
    AssignPlus,

    #[token("-=")]
    AssignMinus,

    #[token("*=")]
    AssignTimes,

    #[token("/=")]
    AssignDivide,

    #[token("++")]
    PlusPlus,

    #[token("--")]
    MinusMinus,

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    #[token("%")]
    Percent,

    #[token("==")]
    CmpEq,

    #[token("!=")]
    CmpNe,

    #[token("<=")]
    CmpLe,

    #[token(">=")]
    CmpGe,

    #[token("<")]
    CmpLt,

    #[token(">")]
    CmpGt,

    #[token("&&")]
    AndAnd,

    #[token("||")]
    OrOr,

    #[token("!")]
    Not,

    #[token("int")]
    KwInt,

    #[token("bool")]
    KwBool,

    #[token("float")]
    KwFloat,

    #[token("string")]
    KwString,

    #[token("void")]
    KwVoid,

    #[token("sprite")]
    KwSprite,

    #[token("sound")]
    KwSound,

    #[token("object")]
    KwObject,

    #[token("namespace")]
    KwNamespace,

    #[token("using")]
    KwUsing,

    #[token("open")]
    KwOpen,

    #[token("extern")]
    KwExtern,

    #[token("public")]
    KwPublic,

    #[token("private")]
    KwPrivate,

    #[token("event")]
    KwEvent,

    #[token("return")]
    KwReturn,

    #[token("break")]
    KwBreak,

    #[token("if")]
    KwIf,

    #[token("else")]
    KwElse,

    #[token("while")]
    KwWhile,

    #[token("for")]
    KwFor,

    #[token("foreach")]
    KwForeach,

    #[token("none")]
    KwNone,

    #[token("true")]
    KwTrue,

    #[token("false")]
    KwFalse,

    #[token("create")]
    KwCreate,

    #[token("destroy")]
    KwDestroy,

    #[token("delete")]
    KwDelete,

    #[regex(r"[a-zA-Z_][a-zA-Z_0-9]*")]
    Ident,

    #[regex(r"[0-9]+\.[0-9]+")]
    Float,

    #[regex(r"[0-9]+")]
    Int,

    #[regex(r#""(\\.|[^"\\])*""#)]
    String,

    /// Manually created when the lexer runs out of input
    EndOfInput,

    #[error]
    #[regex(r"[ \t\r\n]+", logos::skip)]
    #[regex(r"//[^\n]*", logos::skip)]
    #[regex(r"/\*([^*]|\*+[^*/])*\*+/", logos::skip)]
    Error,
}

impl TokenKind {
    /// How this token is referred to in "expected ..." diagnostics
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::ParenOpen => "'('",
            TokenKind::ParenClose => "')'",
            TokenKind::BraceOpen => "'{'",
            TokenKind::BraceClose => "'}'",
            TokenKind::BracketOpen => "'['",
            TokenKind::BracketClose => "']'",
            TokenKind::Comma => "','",
            TokenKind::Semicolon => "';'",
            TokenKind::Colon => "':'",
            TokenKind::PathSep => "'::'",
            TokenKind::Dot => "'.'",
            TokenKind::Assign => "'='",
            TokenKind::AssignPlus => "'+='",
            TokenKind::AssignMinus => "'-='",
            TokenKind::AssignTimes => "'*='",
            TokenKind::AssignDivide => "'/='",
            TokenKind::PlusPlus => "'++'",
            TokenKind::MinusMinus => "'--'",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Percent => "'%'",
            TokenKind::CmpEq => "'=='",
            TokenKind::CmpNe => "'!='",
            TokenKind::CmpLe => "'<='",
            TokenKind::CmpGe => "'>='",
            TokenKind::CmpLt => "'<'",
            TokenKind::CmpGt => "'>'",
            TokenKind::AndAnd => "'&&'",
            TokenKind::OrOr => "'||'",
            TokenKind::Not => "'!'",
            TokenKind::KwInt => "'int'",
            TokenKind::KwBool => "'bool'",
            TokenKind::KwFloat => "'float'",
            TokenKind::KwString => "'string'",
            TokenKind::KwVoid => "'void'",
            TokenKind::KwSprite => "'sprite'",
            TokenKind::KwSound => "'sound'",
            TokenKind::KwObject => "'object'",
            TokenKind::KwNamespace => "'namespace'",
            TokenKind::KwUsing => "'using'",
            TokenKind::KwOpen => "'open'",
            TokenKind::KwExtern => "'extern'",
            TokenKind::KwPublic => "'public'",
            TokenKind::KwPrivate => "'private'",
            TokenKind::KwEvent => "'event'",
            TokenKind::KwReturn => "'return'",
            TokenKind::KwBreak => "'break'",
            TokenKind::KwIf => "'if'",
            TokenKind::KwElse => "'else'",
            TokenKind::KwWhile => "'while'",
            TokenKind::KwFor => "'for'",
            TokenKind::KwForeach => "'foreach'",
            TokenKind::KwNone => "'none'",
            TokenKind::KwTrue => "'true'",
            TokenKind::KwFalse => "'false'",
            TokenKind::KwCreate => "'create'",
            TokenKind::KwDestroy => "'destroy'",
            TokenKind::KwDelete => "'delete'",
            TokenKind::Ident => "an identifier",
            TokenKind::Float => "a float literal",
            TokenKind::Int => "an int literal",
            TokenKind::String => "a string literal",
            TokenKind::EndOfInput => "end of input",
            TokenKind::Error => "a valid token",
        }
    }

    /// Whether this token can start a type
    pub fn starts_type(self) -> bool {
        matches!(
            self,
            TokenKind::KwInt
                | TokenKind::KwBool
                | TokenKind::KwFloat
                | TokenKind::KwString
                | TokenKind::KwVoid
                | TokenKind::KwSprite
                | TokenKind::KwSound
                | TokenKind::Ident
        )
    }
}
