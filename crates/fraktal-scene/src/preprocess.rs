use std::ops::Range;

use crate::cursor::{Cursor, List, argument};
use crate::error::SceneError;
use crate::params::{SceneParams, Sun, Widget, yfov_to_focal};

/// Fills `params` from the scene directives in `text` and blanks those
/// directives out with spaces (newlines are kept, so line numbers of the
/// remaining kernel source are unchanged).
///
/// Other `#` directives, such as kernel `#param` lines, are left alone.
/// Directive names match by prefix and the rest of the word is skipped, so
/// `#viewport(..)` reads as `#view(..)`.
/// Parsing stops at the first error: fields set by earlier directives keep
/// their values and earlier directives are still blanked.
pub fn preprocess(text: &mut String, params: &mut SceneParams) -> Result<(), SceneError> {
    let mut blanked = Vec::new();
    let result = scan(text, params, &mut blanked);
    if !blanked.is_empty() {
        *text = blank(text, &blanked);
    }
    result
}

fn scan(text: &str, params: &mut SceneParams, blanked: &mut Vec<Range<usize>>) -> Result<(), SceneError> {
    let mut c = Cursor::new(text);
    while let Some(b) = c.peek() {
        if b == b'/' {
            let before = c.pos();
            c.skip_comment();
            if c.pos() != before {
                continue;
            }
        }
        if b != b'#' {
            c.bump();
            continue;
        }

        let mark = c.pos();
        c.bump();
        let handled = if c.eat_str("resolution") {
            resolution(&mut c, params)?;
            true
        } else if c.eat_str("view") {
            view(&mut c, params)?;
            true
        } else if c.eat_str("camera") {
            camera(&mut c, params)?;
            true
        } else if c.eat_str("sun") {
            sun(&mut c, params)?;
            true
        } else if c.eat_str("widget") {
            widget(&mut c, params)?;
            true
        } else {
            false
        };
        if handled {
            blanked.push(mark..c.pos());
        }
    }
    Ok(())
}

fn blank(src: &str, ranges: &[Range<usize>]) -> String {
    let mut out = String::with_capacity(src.len());
    let mut last = 0;
    for r in ranges {
        out.push_str(&src[last..r.start]);
        out.extend(src[r.clone()].chars().map(|ch| if ch == '\n' { '\n' } else { ' ' }));
        last = r.end;
    }
    out.push_str(&src[last..]);
    out
}

// ── Directives ────────────────────────────────────────────────────────────

fn open_list(c: &mut Cursor<'_>, directive: &str) -> Result<List, SceneError> {
    c.skip_alpha();
    c.skip_blank();
    List::begin(c).ok_or_else(|| c.error(format!("missing ( after '{directive}'")).within(directive))
}

fn unexpected(c: &Cursor<'_>) -> SceneError {
    c.error("unexpected argument")
}

fn resolution(c: &mut Cursor<'_>, params: &mut SceneParams) -> Result<(), SceneError> {
    c.skip_alpha();
    c.skip_blank();
    params.resolution = c.int2().map_err(|e| e.within("#resolution(x,y)"))?;
    Ok(())
}

fn view(c: &mut Cursor<'_>, params: &mut SceneParams) -> Result<(), SceneError> {
    let mut list = open_list(c, "#view")?;
    view_arguments(c, &mut list, params).map_err(|e| e.within("#view"))
}

fn view_arguments(c: &mut Cursor<'_>, list: &mut List, params: &mut SceneParams) -> Result<(), SceneError> {
    while list.next(c)? {
        if let Some(dir) = argument(c, "dir", Cursor::angle2)? {
            params.view.dir = dir;
        } else if let Some(pos) = argument(c, "pos", Cursor::float3)? {
            params.view.pos = pos;
        } else {
            return Err(unexpected(c));
        }
    }
    Ok(())
}

fn camera(c: &mut Cursor<'_>, params: &mut SceneParams) -> Result<(), SceneError> {
    let mut list = open_list(c, "#camera")?;
    camera_arguments(c, &mut list, params).map_err(|e| e.within("#camera"))
}

fn camera_arguments(c: &mut Cursor<'_>, list: &mut List, params: &mut SceneParams) -> Result<(), SceneError> {
    while list.next(c)? {
        if let Some(yfov) = argument(c, "yfov", Cursor::angle)? {
            if params.resolution.y == 0 {
                return Err(c.error("#resolution must be set when specifying FOV ('yfov')"));
            }
            params.camera.f = yfov_to_focal(yfov, params.resolution.y as f32);
        } else if let Some(f) = argument(c, "f", Cursor::scalar)? {
            params.camera.f = f;
        } else if let Some(center) = argument(c, "center", Cursor::float2)? {
            params.camera.center = center;
        } else {
            return Err(unexpected(c));
        }
    }
    Ok(())
}

/// Parses `size=`, `dir=`, `color=` and `intensity=` arguments into `sun`
/// until the list closes.
fn sun_arguments(c: &mut Cursor<'_>, list: &mut List, sun: &mut Sun) -> Result<(), SceneError> {
    while list.next(c)? {
        if let Some(size) = argument(c, "size", Cursor::angle)? {
            sun.size = size;
        } else if let Some(dir) = argument(c, "dir", Cursor::angle2)? {
            sun.dir = dir;
        } else if let Some(color) = argument(c, "color", Cursor::float3)? {
            sun.color = color;
        } else if let Some(intensity) = argument(c, "intensity", Cursor::scalar)? {
            sun.intensity = intensity;
        } else {
            return Err(unexpected(c));
        }
    }
    Ok(())
}

fn sun(c: &mut Cursor<'_>, params: &mut SceneParams) -> Result<(), SceneError> {
    let mut list = open_list(c, "#sun")?;
    sun_arguments(c, &mut list, &mut params.sun).map_err(|e| e.within("#sun"))
}

fn widget(c: &mut Cursor<'_>, params: &mut SceneParams) -> Result<(), SceneError> {
    let mut list = open_list(c, "#widget")?;
    c.skip_blank();
    if c.eat_str("Sun") {
        c.skip_blank();
        if !c.eat(b',') {
            return Err(c.error("missing comma after widget name").within("Sun #widget"));
        }
        let mut sun = Sun::default();
        sun_arguments(c, &mut list, &mut sun).map_err(|e| e.within("Sun #widget"))?;
        params.widgets.push(Widget::Sun(sun));
        Ok(())
    } else {
        Err(c.error("unknown widget type").within("#widget"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{Angle2, Float2, Float3, Int2};

    fn run(src: &str) -> (String, SceneParams, Result<(), SceneError>) {
        let mut text = src.to_owned();
        let mut params = SceneParams::default();
        let result = preprocess(&mut text, &mut params);
        (text, params, result)
    }

    #[test]
    fn resolution() {
        let (text, params, result) = run("#resolution(320,240)");
        result.unwrap();
        assert_eq!(params.resolution, Int2 { x: 320, y: 240 });
        assert_eq!(text, " ".repeat(20));
    }

    #[test]
    fn sun_with_all_arguments() {
        let (_, params, result) = run("#sun(size=0.5deg, dir=(10deg,20deg), color=(1,1,1), intensity=3)");
        result.unwrap();
        assert_eq!(params.sun.size, 0.5);
        assert_eq!(params.sun.dir, Angle2 { theta: 10.0, phi: 20.0 });
        assert_eq!(params.sun.color, Float3 { x: 1.0, y: 1.0, z: 1.0 });
        assert_eq!(params.sun.intensity, 3.0);
    }

    #[test]
    fn view_and_camera() {
        let src = "#resolution(200, 100)\n#view(dir=(30deg, -15deg), pos=(0, 0.5, 4))\n#camera(yfov=90deg, center=(100,50))\n";
        let (text, params, result) = run(src);
        result.unwrap();
        assert_eq!(params.view.dir, Angle2 { theta: 30.0, phi: -15.0 });
        assert_eq!(params.view.pos, Float3 { x: 0.0, y: 0.5, z: 4.0 });
        assert!((params.camera.f - 50.0).abs() < 1e-3);
        assert_eq!(params.camera.center, Float2 { x: 100.0, y: 50.0 });
        assert_eq!(text.lines().count(), 3);
        assert!(text.trim().is_empty());
    }

    #[test]
    fn yfov_needs_resolution() {
        let (_, _, result) = run("#camera(yfov=60deg)");
        assert!(result.unwrap_err().message.contains("#resolution must be set"));
    }

    #[test]
    fn explicit_focal_length() {
        let (_, params, result) = run("#camera(f=512.5)");
        result.unwrap();
        assert_eq!(params.camera.f, 512.5);
    }

    #[test]
    fn missing_closing_paren_keeps_consumed_fields() {
        let (_, params, result) = run("#resolution(64,32)\n#sun(size=2deg, intensity=4");
        assert!(result.is_err());
        assert_eq!(params.resolution, Int2 { x: 64, y: 32 });
        assert_eq!(params.sun.size, 2.0);
        assert_eq!(params.sun.intensity, 4.0);
        assert_eq!(params.sun.color, Float3::default());
    }

    #[test]
    fn unknown_argument_aborts() {
        let (_, _, result) = run("#view(dir=(1deg,2deg), zoom=2)");
        let e = result.unwrap_err();
        assert!(e.message.starts_with("error parsing #view directive"));
        assert!(e.message.contains("unexpected argument"));
    }

    #[test]
    fn kernel_directives_and_comments_are_untouched() {
        let src = "#param(float, iGain)\n// #resolution(1,1)\n/* #sun(size=x) */\n#resolution(8,8)\n";
        let (text, params, result) = run(src);
        result.unwrap();
        assert_eq!(params.resolution, Int2 { x: 8, y: 8 });
        assert!(text.starts_with("#param(float, iGain)\n// #resolution(1,1)\n/* #sun(size=x) */\n"));
        assert!(!text.contains("#resolution(8,8)"));
    }

    #[test]
    fn directive_names_match_by_prefix() {
        let (text, params, result) = run("#viewport(pos=(1,2,3))\n#resolutions(4,4)");
        result.unwrap();
        assert_eq!(params.view.pos, Float3 { x: 1.0, y: 2.0, z: 3.0 });
        assert_eq!(params.resolution, Int2 { x: 4, y: 4 });
        assert!(text.trim().is_empty());
    }

    #[test]
    fn sun_widget() {
        let (_, params, result) = run("#widget(Sun, dir=(45deg, 30deg), intensity=2)");
        result.unwrap();
        let [Widget::Sun(sun)] = params.widgets.as_slice() else {
            panic!("expected one sun widget");
        };
        assert_eq!(sun.dir, Angle2 { theta: 45.0, phi: 30.0 });
        assert_eq!(sun.intensity, 2.0);
    }

    #[test]
    fn unknown_widget() {
        let (_, _, result) = run("#widget(Moon, size=1deg)");
        assert!(result.unwrap_err().message.contains("unknown widget type"));
    }

    #[test]
    fn earlier_directives_are_blanked_on_error() {
        let (text, _, result) = run("#resolution(4,4)\n#view(pos=(1,2))\n");
        assert!(result.is_err());
        assert!(text.starts_with("                \n#view"));
    }
}
