/// Notification templates
use crate::payments::PaymentType;

/// An event worth telling a user about
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Welcome {
        user_name: String,
    },
    AdApproved {
        user_name: String,
        ad_id: String,
        ad_title: String,
        price: Option<f64>,
    },
    AdRejected {
        user_name: String,
        ad_id: String,
        ad_title: String,
    },
    ViewsMilestone {
        user_name: String,
        ad_id: String,
        ad_title: String,
        milestone: i64,
    },
    PaymentSuccess {
        user_name: String,
        ad_id: String,
        ad_title: String,
        payment_type: PaymentType,
        /// Minor units
        amount: i64,
    },
}

/// Subject and plain-text body
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEmail {
    pub subject: String,
    pub body: String,
}

impl Notification {
    /// Short name used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Welcome { .. } => "welcome",
            Notification::AdApproved { .. } => "ad_approved",
            Notification::AdRejected { .. } => "ad_rejected",
            Notification::ViewsMilestone { .. } => "views_milestone",
            Notification::PaymentSuccess { .. } => "payment_success",
        }
    }

    pub fn render(&self, site_url: &str) -> RenderedEmail {
        match self {
            Notification::Welcome { user_name } => RenderedEmail {
                subject: "Bine ai venit pe X67 Digital Media!".to_string(),
                body: format!(
                    r#"Salut {},

Contul tău pe X67 Digital Media a fost creat cu succes.

Acum poți:
- publica anunțuri în orice categorie
- salva anunțurile favorite
- comunica direct cu vânzătorii

Publică primul anunț: {}/create-ad

Echipa X67 Digital Media
"#,
                    user_name, site_url
                ),
            },
            Notification::AdApproved {
                user_name,
                ad_id,
                ad_title,
                price,
            } => RenderedEmail {
                subject: format!("✅ Anunțul tău a fost aprobat - {}", ad_title),
                body: format!(
                    r#"Salut {},

Anunțul tău "{}" ({}) a fost aprobat și este acum vizibil pe site.

Vezi anunțul: {}/ad/{}

Echipa X67 Digital Media
"#,
                    user_name,
                    ad_title,
                    price_label(*price),
                    site_url,
                    ad_id
                ),
            },
            Notification::AdRejected {
                user_name,
                ad_title,
                ..
            } => RenderedEmail {
                subject: format!("❌ Anunțul tău a fost respins - {}", ad_title),
                body: format!(
                    r#"Salut {},

Anunțul tău "{}" nu a fost aprobat.

Motivul respingerii poate fi: conținut necorespunzător, informații incomplete sau încălcarea regulamentului platformei.
Te rugăm să verifici regulamentul și să încerci din nou cu un anunț actualizat.

Creează un anunț nou: {}/create-ad

Echipa X67 Digital Media
"#,
                    user_name, ad_title, site_url
                ),
            },
            Notification::ViewsMilestone {
                user_name,
                ad_id,
                ad_title,
                milestone,
            } => RenderedEmail {
                subject: format!("🎉 Anunțul tău a atins {} vizualizări!", milestone),
                body: format!(
                    r#"Salut {},

Anunțul tău "{}" a atins {} vizualizări.

Anunțul tău atrage atenția! Vrei să ajungi la și mai mulți cumpărători?

Vezi anunțul: {}/ad/{}

Echipa X67 Digital Media
"#,
                    user_name, ad_title, milestone, site_url, ad_id
                ),
            },
            Notification::PaymentSuccess {
                user_name,
                ad_id,
                ad_title,
                payment_type,
                amount,
            } => RenderedEmail {
                subject: format!("💳 Plată confirmată - {}", payment_label(*payment_type)),
                body: format!(
                    r#"Salut {},

Plata ta a fost procesată cu succes.

Serviciu: {}
Anunț: {}
Sumă: {:.2} RON

Vezi anunțul: {}/ad/{}

Echipa X67 Digital Media
"#,
                    user_name,
                    payment_label(*payment_type),
                    ad_title,
                    crate::payments::to_major_units(*amount),
                    site_url,
                    ad_id
                ),
            },
        }
    }
}

/// Price line shown in approval emails
pub fn price_label(price: Option<f64>) -> String {
    match price {
        Some(price) if price != 0.0 => format!("{} €", price),
        _ => "Preț la cerere".to_string(),
    }
}

/// Localised payment type
pub fn payment_label(payment_type: PaymentType) -> &'static str {
    match payment_type {
        PaymentType::PostAd => "Publicare anunț",
        PaymentType::Boost => "Ridicare anunț",
        PaymentType::Promote => "Promovare anunț",
    }
}
