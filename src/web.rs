use colored::*;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::annotations::SegmentEvent;
use crate::cli::Args;
use crate::stream::AnalysisClient;
use crate::AnalysisSession;

/// Embedded single-page dashboard: paste text, stream the analysis, watch
/// category-colored highlights land batch by batch.
pub const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>TeamPulse Highlight</title>
<style>
*{margin:0;padding:0;box-sizing:border-box}
body{background:#0d1117;color:#c9d1d9;font-family:'Cascadia Code','Fira Code',monospace;min-height:100vh;display:flex;flex-direction:column}
header{padding:16px 24px;border-bottom:1px solid #21262d;display:flex;align-items:center;justify-content:space-between}
header h1{font-size:1.2rem;color:#58a6ff}
.controls{display:flex;gap:10px;padding:12px 24px;flex-wrap:wrap;align-items:end;border-bottom:1px solid #21262d;background:#161b22}
.field{display:flex;flex-direction:column;gap:3px;flex:1}
.field label{font-size:.7rem;color:#8b949e;text-transform:uppercase;letter-spacing:.5px}
.field textarea{background:#0d1117;border:1px solid #30363d;color:#c9d1d9;padding:8px 10px;border-radius:6px;font-family:inherit;font-size:.9rem;min-height:90px;resize:vertical;width:100%}
.field textarea:focus{outline:none;border-color:#58a6ff}
.btn{border:none;padding:8px 16px;border-radius:6px;font-family:inherit;font-size:.85rem;cursor:pointer;color:#fff}
.btn-go{background:#238636}.btn-go:hover{background:#2ea043}
.btn-go:disabled{background:#21262d;color:#484f58;cursor:not-allowed}
#doc{flex:1;padding:20px 24px;line-height:1.9;font-size:1rem;white-space:pre-wrap;word-wrap:break-word;overflow-y:auto}
mark{border-radius:3px;padding:0 2px;color:#0d1117;cursor:help;position:relative}
mark.hl-manipulation{background:#f85149}
mark.hl-cognitive_bias{background:#e3b341}
mark.hl-rhetorical_fallacy{background:#58a6ff}
mark.hl-other{background:#a371f7}
mark[data-severity="3"]{font-weight:bold}
mark[data-severity="4"]{font-weight:bold;text-decoration:underline}
mark[title]:hover::after{content:attr(title);position:absolute;top:-2em;left:0;background:#1c2333;color:#c9d1d9;padding:2px 8px;border-radius:4px;font-size:.7rem;white-space:nowrap;z-index:10;pointer-events:none}
#stats{padding:8px 24px;border-top:1px solid #21262d;font-size:.78rem;color:#8b949e;background:#161b22;display:flex;gap:20px;flex-wrap:wrap}
.legend{display:flex;gap:14px;font-size:.72rem;color:#8b949e;align-items:center}
.swatch{display:inline-block;width:10px;height:10px;border-radius:2px;margin-right:4px;vertical-align:middle}
#err{color:#f85149;font-size:.8rem;padding:4px 24px;display:none}
@keyframes fadeIn{from{opacity:0}to{opacity:1}}
mark{animation:fadeIn .15s ease-in}
</style>
</head>
<body>
<header>
  <h1>TeamPulse Highlight</h1>
  <div class="legend">
    <span><span class="swatch" style="background:#f85149"></span>manipulation</span>
    <span><span class="swatch" style="background:#e3b341"></span>cognitive bias</span>
    <span><span class="swatch" style="background:#58a6ff"></span>rhetorical fallacy</span>
    <span><span class="swatch" style="background:#a371f7"></span>other</span>
  </div>
</header>
<div class="controls">
  <div class="field"><label>Conversation text</label><textarea id="text" placeholder="Paste the negotiation transcript..."></textarea></div>
  <button class="btn btn-go" id="start">Analyze</button>
</div>
<div id="err"></div>
<div id="doc"></div>
<div id="stats"></div>
<script>
const $=s=>document.querySelector(s);
let es=null;

function esc(s){const d=document.createElement('div');d.textContent=s;return d.innerHTML;}

function renderSegments(segments){
  const doc=$('#doc');
  doc.innerHTML='';
  for(const seg of segments){
    if(seg.kind==='highlight'){
      const m=document.createElement('mark');
      const a=seg.annotation;
      m.className='hl-'+(a.category||'other');
      m.dataset.severity=a.severity||1;
      const tip=[a.category,a.explanation,a.recommendation].filter(Boolean).join(' | ');
      if(tip)m.title=tip;
      m.textContent=seg.content;
      doc.appendChild(m);
    } else {
      doc.appendChild(document.createTextNode(seg.content));
    }
  }
}

$('#start').onclick=()=>{
  if(es){es.close();es=null}
  $('#err').style.display='none';
  $('#doc').textContent=$('#text').value;
  $('#stats').textContent='';
  const url='/stream?text='+encodeURIComponent($('#text').value);
  $('#start').disabled=true;$('#start').textContent='Analyzing...';
  es=new EventSource(url);
  es.onmessage=e=>{
    if(e.data==='[DONE]'){
      es.close();es=null;
      $('#start').disabled=false;$('#start').textContent='Analyze';
      return;
    }
    try{
      const ev=JSON.parse(e.data);
      if(ev.error){
        $('#err').textContent=ev.error;$('#err').style.display='block';
        return;
      }
      renderSegments(ev.segments);
      $('#stats').textContent='Batch '+ev.batch_index+' | Resolved: '+ev.resolved+' | Dropped: '+ev.dropped;
    }catch(_){}
  };
  es.onerror=()=>{es.close();es=null;$('#start').disabled=false;$('#start').textContent='Analyze'};
};
</script>
</body>
</html>"##;

/// Percent-decoding for URL query parameters. Decoded bytes are collected
/// before UTF-8 conversion so multi-byte sequences (encodeURIComponent output
/// for non-ASCII text) survive intact.
pub fn url_decode(s: &str) -> String {
    let mut bytes: Vec<u8> = Vec::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            '+' => bytes.push(b' '),
            '%' => {
                let hex: String = chars.by_ref().take(2).collect();
                if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                    bytes.push(byte);
                }
            }
            _ => {
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Parse query string into key-value pairs.
pub fn parse_query(query: &str) -> std::collections::HashMap<String, String> {
    query
        .split('&')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?;
            let val = parts.next().unwrap_or("");
            Some((key.to_string(), url_decode(val)))
        })
        .collect()
}

/// Start the dashboard server and open the browser.
pub async fn serve(port: u16, default_args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(format!("127.0.0.1:{}", port)).await?;

    eprintln!(
        "{}",
        format!("  Dashboard running at http://localhost:{}", port).bright_green()
    );
    eprintln!("{}", "  Press Ctrl+C to stop.".bright_blue());

    // Try to open the browser
    #[cfg(target_os = "windows")]
    {
        let _ = std::process::Command::new("cmd")
            .args(["/C", &format!("start http://localhost:{}", port)])
            .spawn();
    }
    #[cfg(target_os = "macos")]
    {
        let _ = std::process::Command::new("open")
            .arg(format!("http://localhost:{}", port))
            .spawn();
    }
    #[cfg(target_os = "linux")]
    {
        let _ = std::process::Command::new("xdg-open")
            .arg(format!("http://localhost:{}", port))
            .spawn();
    }

    let backend = default_args.backend.clone();
    let client_label = default_args.client.clone();

    loop {
        let (stream, _addr) = listener.accept().await?;
        let backend = backend.clone();
        let client_label = client_label.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, backend, client_label).await {
                tracing::warn!(error = %e, "connection error");
            }
        });
    }
}

async fn handle_connection(
    mut stream: tokio::net::TcpStream,
    backend: Option<String>,
    client_label: String,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use tokio::io::AsyncReadExt;

    let mut buf = vec![0u8; 16384];
    let n = stream.read(&mut buf).await?;
    let request = String::from_utf8_lossy(&buf[..n]);

    // Parse the request line: "GET /path?query HTTP/1.1"
    let first_line = request.lines().next().unwrap_or("");
    let parts: Vec<&str> = first_line.split_whitespace().collect();
    if parts.len() < 2 {
        return Ok(());
    }
    let path_and_query = parts[1];

    let (path, query_str) = if let Some(idx) = path_and_query.find('?') {
        (&path_and_query[..idx], &path_and_query[idx + 1..])
    } else {
        (path_and_query, "")
    };

    match path {
        "/" => {
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                INDEX_HTML.len(),
                INDEX_HTML,
            );
            stream.write_all(response.as_bytes()).await?;
        }
        "/stream" => {
            let params = parse_query(query_str);
            let text = params.get("text").cloned().unwrap_or_default();

            // SSE headers
            let headers = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nConnection: keep-alive\r\nAccess-Control-Allow-Origin: *\r\n\r\n";
            stream.write_all(headers.as_bytes()).await?;

            let Some(backend_url) = backend else {
                let err_event =
                    "data: {\"error\": \"no analysis backend configured; restart with --backend URL\"}\n\ndata: [DONE]\n\n";
                stream.write_all(err_event.as_bytes()).await?;
                return Ok(());
            };

            // Channel for per-batch segment snapshots
            let (tx, mut rx) = mpsc::unbounded_channel::<SegmentEvent>();

            let mut session = AnalysisSession::new(text);
            session.event_tx = Some(tx);
            session.client_label = Some(client_label);

            // Drive the backend stream in the background; the session pushes
            // a snapshot into the channel after every batch.
            let stream_task = tokio::spawn(async move {
                let client = AnalysisClient::new(backend_url);
                if let Err(e) = client.stream_analysis(&mut session).await {
                    tracing::warn!(error = %e, "analysis stream failed");
                    return Err(e.to_string());
                }
                Ok(())
            });

            // Forward snapshot events as SSE
            while let Some(event) = rx.recv().await {
                if let Ok(json) = serde_json::to_string(&event) {
                    let sse = format!("data: {}\n\n", json);
                    if stream.write_all(sse.as_bytes()).await.is_err() {
                        break;
                    }
                }
            }

            if let Ok(Err(msg)) = stream_task.await {
                let err_event =
                    format!("data: {{\"error\": \"{}\"}}\n\n", msg.replace('"', "'"));
                let _ = stream.write_all(err_event.as_bytes()).await;
            }

            let _ = stream.write_all(b"data: [DONE]\n\n").await;
        }
        _ => {
            let response =
                "HTTP/1.1 404 Not Found\r\nContent-Length: 9\r\nConnection: close\r\n\r\nNot Found";
            stream.write_all(response.as_bytes()).await?;
        }
    }

    Ok(())
}
