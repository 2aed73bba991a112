//! Streaming XMLTV writer.
//!
//! Emits one document: header, every merged channel's preserved raw fragment
//! verbatim, then all programmes re-rendered from the structured model in
//! ascending start order. Text payloads are escaped; a missing language on a
//! title, sub-title or description is emitted as `lang="en"`.

use std::io::Write;

use quick_xml::escape::escape;

use crate::models::{LangText, MergedGuide, Programme};
use crate::xmltv::time::format_timestamp;

/// Write the merged guide as a complete XMLTV document.
pub fn write_guide<W: Write>(
    out: &mut W,
    guide: &MergedGuide,
    generator: &str,
) -> std::io::Result<()> {
    writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(out, r#"<tv generator-info-name="{}">"#, escape(generator))?;

    for channel in guide.channels.values() {
        writeln!(out, "  {}", channel.raw_xml)?;
    }

    let mut programmes: Vec<&Programme> = guide.programmes.values().flatten().collect();
    programmes.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.channel.cmp(&b.channel)));

    for programme in programmes {
        write_programme(out, programme)?;
    }

    writeln!(out, "</tv>")?;
    Ok(())
}

fn write_programme<W: Write>(out: &mut W, p: &Programme) -> std::io::Result<()> {
    writeln!(
        out,
        r#"  <programme start="{}" stop="{}" channel="{}">"#,
        format_timestamp(&p.start),
        format_timestamp(&p.stop),
        escape(&p.channel)
    )?;

    for title in &p.titles {
        write_lang_text(out, "title", title)?;
    }
    for sub_title in &p.sub_titles {
        write_lang_text(out, "sub-title", sub_title)?;
    }
    for desc in &p.descs {
        write_lang_text(out, "desc", desc)?;
    }

    if !p.credits.is_empty() {
        writeln!(out, "    <credits>")?;
        for (role, names) in [
            ("director", &p.credits.directors),
            ("actor", &p.credits.actors),
            ("writer", &p.credits.writers),
            ("producer", &p.credits.producers),
            ("presenter", &p.credits.presenters),
        ] {
            for name in names {
                writeln!(out, "      <{role}>{}</{role}>", escape(name))?;
            }
        }
        writeln!(out, "    </credits>")?;
    }

    for category in &p.categories {
        writeln!(out, "    <category>{}</category>", escape(category))?;
    }
    for episode in &p.episode_nums {
        match &episode.system {
            Some(system) => writeln!(
                out,
                r#"    <episode-num system="{}">{}</episode-num>"#,
                escape(system),
                escape(&episode.text)
            )?,
            None => writeln!(out, "    <episode-num>{}</episode-num>", escape(&episode.text))?,
        }
    }
    for icon in &p.icons {
        writeln!(out, r#"    <icon src="{}"/>"#, escape(icon))?;
    }
    for rating in &p.ratings {
        writeln!(out, "    <rating><value>{}</value></rating>", escape(rating))?;
    }

    writeln!(out, "  </programme>")?;
    Ok(())
}

fn write_lang_text<W: Write>(out: &mut W, tag: &str, value: &LangText) -> std::io::Result<()> {
    let lang = value.lang.as_deref().unwrap_or("en");
    writeln!(
        out,
        r#"    <{tag} lang="{}">{}</{tag}>"#,
        escape(lang),
        escape(&value.text)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Channel, Credits, EpisodeNum};
    use crate::xmltv::lexer::parse_document;
    use crate::xmltv::time::parse_timestamp;
    use std::collections::BTreeSet;

    fn programme(channel: &str, start: &str, stop: &str, title: &str) -> Programme {
        Programme {
            channel: channel.to_string(),
            start: parse_timestamp(start).unwrap(),
            stop: parse_timestamp(stop).unwrap(),
            titles: vec![LangText::new(None, title)],
            sub_titles: Vec::new(),
            descs: Vec::new(),
            credits: Credits::default(),
            categories: BTreeSet::new(),
            episode_nums: Vec::new(),
            icons: BTreeSet::new(),
            ratings: BTreeSet::new(),
            source_site: "a.example".to_string(),
        }
    }

    fn render(guide: &MergedGuide) -> String {
        let mut buf = Vec::new();
        write_guide(&mut buf, guide, "epg-collate").unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_programmes_sorted_by_start_across_channels() {
        let mut guide = MergedGuide::default();
        guide.programmes.insert(
            "b".to_string(),
            vec![programme("b", "20240101140000 +0000", "20240101150000 +0000", "Later")],
        );
        guide.programmes.insert(
            "a".to_string(),
            vec![
                programme("a", "20240101150000 +0000", "20240101160000 +0000", "Latest"),
                programme("a", "20240101120000 +0000", "20240101130000 +0000", "First"),
            ],
        );
        let output = render(&guide);
        let first = output.find("First").unwrap();
        let later = output.find("Later").unwrap();
        let latest = output.find("Latest").unwrap();
        assert!(first < later && later < latest);
    }

    #[test]
    fn test_channel_raw_fragment_verbatim() {
        let raw = r#"<channel id="ch1"><display-name>One &amp; Only</display-name></channel>"#;
        let mut guide = MergedGuide::default();
        guide.channels.insert(
            "ch1".to_string(),
            Channel {
                id: "ch1".to_string(),
                display_name: "One & Only".to_string(),
                icon: None,
                url: None,
                source_site: "a.example".to_string(),
                raw_xml: raw.to_string(),
            },
        );
        assert!(render(&guide).contains(raw));
    }

    #[test]
    fn test_default_lang_and_escaping() {
        let mut guide = MergedGuide::default();
        let mut p = programme("c", "20240101120000 +0000", "20240101130000 +0000", "Tom & Jerry");
        p.descs.push(LangText::new(Some("fr".to_string()), "a < b"));
        guide.programmes.insert("c".to_string(), vec![p]);
        let output = render(&guide);
        assert!(output.contains(r#"<title lang="en">Tom &amp; Jerry</title>"#));
        assert!(output.contains(r#"<desc lang="fr">a &lt; b</desc>"#));
    }

    #[test]
    fn test_round_trip_preserves_fields() {
        let mut guide = MergedGuide::default();
        let mut p = programme("ch1", "20240101120000 +0000", "20240101130000 +0000", "Show");
        p.sub_titles.push(LangText::new(None, "Part 1"));
        p.descs.push(LangText::new(Some("en".to_string()), "A fine show."));
        p.credits.actors.push("Alice".to_string());
        p.categories.insert("Drama".to_string());
        p.episode_nums.push(EpisodeNum {
            system: Some("onscreen".to_string()),
            text: "S2E1".to_string(),
        });
        p.icons.insert("https://example.com/p.png".to_string());
        p.ratings.insert("TV-14".to_string());
        guide.programmes.insert("ch1".to_string(), vec![p.clone()]);

        let reparsed = parse_document(&render(&guide), "a.example");
        assert_eq!(reparsed.programmes.len(), 1);
        let q = &reparsed.programmes[0];
        assert_eq!(q.start, p.start);
        assert_eq!(q.stop, p.stop);
        assert_eq!(q.titles[0].text, "Show");
        // default language materialized on the way out
        assert_eq!(q.titles[0].lang.as_deref(), Some("en"));
        assert_eq!(q.sub_titles[0].text, "Part 1");
        assert_eq!(q.descs, p.descs);
        assert_eq!(q.credits, p.credits);
        assert_eq!(q.categories, p.categories);
        assert_eq!(q.episode_nums, p.episode_nums);
        assert_eq!(q.icons, p.icons);
        assert_eq!(q.ratings, p.ratings);
    }
}
